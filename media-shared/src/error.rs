use std::num::ParseIntError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // ICE candidate errors
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("candidate is missing required field: {0}")]
    ErrCandidateMissingField(&'static str),
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("could not parse type")]
    ErrParseType,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,

    // ICE server errors
    #[error("invalid url")]
    ErrInvalidUrl,
    #[error("unknown scheme type")]
    ErrSchemeType,
    #[error("invalid hostname")]
    ErrHost,
    #[error("queries not supported in stun address")]
    ErrStunQuery,
    #[error("invalid query")]
    ErrInvalidQuery,
    #[error("invalid transport protocol type")]
    ErrProtoType,

    /// ErrNoTurnCredentials indicates that a TURN server URL was provided
    /// without required credentials.
    #[error("turn server credentials required")]
    ErrNoTurnCredentials,

    /// ErrTurnCredentials indicates that provided TURN credentials are partial
    /// or malformed.
    #[error("invalid turn server credentials")]
    ErrTurnCredentials,

    /// ErrNoRelayServer indicates that relay candidates were requested but no
    /// TURN server is configured.
    #[error("no turn server configured for relay candidates")]
    ErrNoRelayServer,

    // Endpoint errors
    #[error("invalid transition: {operation} while {state}")]
    InvalidTransition {
        state: String,
        operation: &'static str,
    },
    #[error("endpoint not found: {0}")]
    ErrEndpointNotFound(String),
    #[error("endpoint already released: {0}")]
    ErrEndpointReleased(String),
    #[error("endpoint {0} has an empty public url")]
    ErrEmptyPublicUrl(String),
    #[error("connection: {0}")]
    Connection(#[from] ConnectionError),
    #[error("mutex poison: {0}")]
    PoisonError(String),

    //Third Party Error
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Reports whether the error means a candidate descriptor is unusable.
    ///
    /// Callers evaluating several candidates skip the offending one and keep
    /// going with the rest.
    pub fn is_invalid_candidate(&self) -> bool {
        matches!(
            self,
            Error::ErrAttributeTooShortIceCandidate
                | Error::ErrCandidateMissingField(_)
                | Error::ErrParseRelatedAddr
                | Error::ErrParseType
                | Error::ErrUnknownCandidateType
                | Error::ParseInt(_)
        )
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. })
    }
}

/// Errors reported by the pipeline that owns endpoint topology.
///
/// They are passed through untouched; nothing in this workspace retries a
/// failed connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("unknown endpoint {0}")]
    UnknownEndpoint(String),
    #[error("endpoint {0} is released")]
    Released(String),
    #[error("{source_endpoint} can not feed {sink_endpoint}")]
    Incompatible {
        source_endpoint: String,
        sink_endpoint: String,
    },
    #[error("relay {0} rejected the turn credentials")]
    RelayCredentialsRejected(String),
    #[error("{0}")]
    Other(String),
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}
