//! Candidate classification policy.
//!
//! The transport only executes the directive strings handed to it; it never
//! looks at candidate types itself.

use log::trace;
use shared::error::*;

use crate::candidate::{CandidateDescriptor, CandidateType, unmarshal_candidate};

const TYPE_TOKEN_HOST: &str = "host";
const TYPE_TOKEN_SRFLX: &str = "srflx";
const TYPE_TOKEN_PRFLX: &str = "prflx";
const TYPE_TOKEN_RELAY: &str = "relay";

/// Classifies a discovered candidate.
///
/// Peer reflexive candidates map to [`CandidateType::ServerReflexive`].
/// [`CandidateType::Any`] is never returned.
pub fn classify(candidate: &CandidateDescriptor) -> Result<CandidateType> {
    if candidate.protocol.is_empty() {
        return Err(Error::ErrCandidateMissingField("protocol"));
    }
    if candidate.address.is_empty() {
        return Err(Error::ErrCandidateMissingField("address"));
    }
    if candidate.typ.is_empty() {
        return Err(Error::ErrCandidateMissingField("type"));
    }

    let candidate_type = match candidate.typ.as_str() {
        TYPE_TOKEN_HOST => CandidateType::Host,
        TYPE_TOKEN_SRFLX | TYPE_TOKEN_PRFLX => CandidateType::ServerReflexive,
        TYPE_TOKEN_RELAY => CandidateType::Relay,
        _ => return Err(Error::ErrUnknownCandidateType),
    };

    trace!("classified candidate {candidate} as {candidate_type}");

    Ok(candidate_type)
}

/// Parses an `a=candidate` attribute value and classifies it.
pub fn classify_raw(raw: &str) -> Result<CandidateType> {
    let candidate = unmarshal_candidate(raw)?;
    classify(&candidate)
}

/// Returns the command the transport runs to use a relay path.
///
/// Only [`CandidateType::Relay`] yields a directive; host, server reflexive
/// and the `Any` wildcard need nothing pushed.
pub fn configuration_directive(
    candidate_type: CandidateType,
    server_url: &str,
    username: &str,
    password: &str,
) -> Option<String> {
    match candidate_type {
        CandidateType::Relay => Some(format!(
            "setIceServers('{}', '{}', '{}');",
            quote(server_url),
            quote(username),
            quote(password)
        )),
        CandidateType::Host | CandidateType::ServerReflexive | CandidateType::Any => None,
    }
}

// Directive arguments are single-quoted string literals.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}
