use serde::{Deserialize, Serialize};
use std::fmt;

/// Indicates where an endpoint session is in its lifecycle.
///
/// # State Transitions
///
/// ```text
/// Idle → Starting → Active → Ending → Terminated
///                     └──────────────→ Terminated
/// Terminated → Starting (new session id)
/// ```
///
/// Any state but `Terminated` moves to `Terminated` on release.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointSessionState {
    /// Created, nothing reported by the transport yet.
    #[default]
    #[serde(rename = "idle")]
    Idle,

    /// First inbound activity seen; `SessionStarted` has been emitted.
    #[serde(rename = "starting")]
    Starting,

    /// Media is flowing.
    #[serde(rename = "active")]
    Active,

    /// The upstream source is exhausted; `EndOfStream` has been emitted.
    #[serde(rename = "ending")]
    Ending,

    /// Final for the current session id.
    #[serde(rename = "terminated")]
    Terminated,
}

const SESSION_STATE_IDLE_STR: &str = "idle";
const SESSION_STATE_STARTING_STR: &str = "starting";
const SESSION_STATE_ACTIVE_STR: &str = "active";
const SESSION_STATE_ENDING_STR: &str = "ending";
const SESSION_STATE_TERMINATED_STR: &str = "terminated";

impl EndpointSessionState {
    /// Reports whether `SessionStarted` has been emitted and
    /// `SessionTerminated` has not.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            EndpointSessionState::Starting
                | EndpointSessionState::Active
                | EndpointSessionState::Ending
        )
    }
}

impl fmt::Display for EndpointSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            EndpointSessionState::Idle => SESSION_STATE_IDLE_STR,
            EndpointSessionState::Starting => SESSION_STATE_STARTING_STR,
            EndpointSessionState::Active => SESSION_STATE_ACTIVE_STR,
            EndpointSessionState::Ending => SESSION_STATE_ENDING_STR,
            EndpointSessionState::Terminated => SESSION_STATE_TERMINATED_STR,
        };
        write!(f, "{s}")
    }
}

/// Why a session ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "client-disconnected")]
    ClientDisconnected,
    #[serde(rename = "released")]
    Released,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TerminationReason::Normal => "normal",
            TerminationReason::ClientDisconnected => "client-disconnected",
            TerminationReason::Released => "released",
            TerminationReason::Error => "error",
        };
        write!(f, "{s}")
    }
}
