pub mod bus;

use serde::{Deserialize, Serialize};
use shared::util::math_rand_alpha_number;
use std::fmt;
use std::time::SystemTime;

use crate::session::state::TerminationReason;

const SESSION_ID_LEN: usize = 24;

/// Opaque identifier of one activation of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub(crate) fn generate() -> Self {
        SessionId(math_rand_alpha_number(SESSION_ID_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selects which lifecycle events an observer is registered for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEventKind {
    #[serde(rename = "session-started")]
    SessionStarted,
    #[serde(rename = "session-terminated")]
    SessionTerminated,
    #[serde(rename = "end-of-stream")]
    EndOfStream,
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            LifecycleEventKind::SessionStarted => "session-started",
            LifecycleEventKind::SessionTerminated => "session-terminated",
            LifecycleEventKind::EndOfStream => "end-of-stream",
        };
        write!(f, "{s}")
    }
}

/// Milestones of an endpoint session, stamped when they are emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    SessionStarted {
        session_id: SessionId,
        timestamp: SystemTime,
    },
    SessionTerminated {
        session_id: SessionId,
        reason: TerminationReason,
        timestamp: SystemTime,
    },
    EndOfStream {
        session_id: SessionId,
        timestamp: SystemTime,
    },
}

impl LifecycleEvent {
    pub(crate) fn session_started(session_id: SessionId) -> Self {
        LifecycleEvent::SessionStarted {
            session_id,
            timestamp: SystemTime::now(),
        }
    }

    pub(crate) fn session_terminated(session_id: SessionId, reason: TerminationReason) -> Self {
        LifecycleEvent::SessionTerminated {
            session_id,
            reason,
            timestamp: SystemTime::now(),
        }
    }

    pub(crate) fn end_of_stream(session_id: SessionId) -> Self {
        LifecycleEvent::EndOfStream {
            session_id,
            timestamp: SystemTime::now(),
        }
    }

    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            LifecycleEvent::SessionStarted { .. } => LifecycleEventKind::SessionStarted,
            LifecycleEvent::SessionTerminated { .. } => LifecycleEventKind::SessionTerminated,
            LifecycleEvent::EndOfStream { .. } => LifecycleEventKind::EndOfStream,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            LifecycleEvent::SessionStarted { session_id, .. }
            | LifecycleEvent::SessionTerminated { session_id, .. }
            | LifecycleEvent::EndOfStream { session_id, .. } => session_id,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            LifecycleEvent::SessionStarted { timestamp, .. }
            | LifecycleEvent::SessionTerminated { timestamp, .. }
            | LifecycleEvent::EndOfStream { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the termination reason for `SessionTerminated`.
    pub fn reason(&self) -> Option<TerminationReason> {
        match self {
            LifecycleEvent::SessionTerminated { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::SessionTerminated {
                session_id, reason, ..
            } => write!(f, "{} {session_id} ({reason})", self.kind()),
            _ => write!(f, "{} {}", self.kind(), self.session_id()),
        }
    }
}
