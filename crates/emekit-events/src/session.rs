#![forbid(unsafe_code)]

use emekit_core::{SessionId, SessionState};

/// Events emitted by a key session controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// State machine transition.
    StateChanged {
        session_id: Option<SessionId>,
        from: SessionState,
        to: SessionState,
    },
    /// Platform delivered a license challenge.
    ChallengeReceived {
        session_id: Option<SessionId>,
        challenge_len: usize,
        destination_url: String,
    },
    /// Platform reported a key status.
    KeyStatusChanged {
        session_id: Option<SessionId>,
        status: String,
        usable: bool,
    },
    /// A notification arrived that the state machine could not accept.
    ProtocolViolation {
        session_id: Option<SessionId>,
        notification: &'static str,
        state: SessionState,
    },
    /// Platform reported an out-of-band failure.
    AdapterError {
        session_id: Option<SessionId>,
        code: u32,
        message: String,
    },
}
