#![forbid(unsafe_code)]

use emekit_core::SessionId;

use crate::{DrmEvent, SessionEvent};

/// Unified event for key sessions and their decryption path.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Key session event.
    Session(SessionEvent),
    /// Decryption engine event.
    Drm(DrmEvent),
}

impl Event {
    /// Session the event belongs to, when it carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Session(
                SessionEvent::StateChanged { session_id, .. }
                | SessionEvent::ChallengeReceived { session_id, .. }
                | SessionEvent::KeyStatusChanged { session_id, .. }
                | SessionEvent::ProtocolViolation { session_id, .. }
                | SessionEvent::AdapterError { session_id, .. },
            ) => session_id.as_ref(),
            Self::Drm(DrmEvent::EngineCreated { session_id, .. }) => Some(session_id),
            Self::Drm(DrmEvent::EngineUnavailable { .. }) => None,
        }
    }
}

impl From<SessionEvent> for Event {
    fn from(e: SessionEvent) -> Self {
        Self::Session(e)
    }
}

impl From<DrmEvent> for Event {
    fn from(e: DrmEvent) -> Self {
        Self::Drm(e)
    }
}
