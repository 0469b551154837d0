#![forbid(unsafe_code)]

use emekit_core::SessionId;

/// Events emitted by the decryption path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrmEvent {
    /// Decryption engine constructed for a session.
    EngineCreated {
        key_system: String,
        session_id: SessionId,
    },
    /// Engine construction failed.
    EngineUnavailable { key_system: String, reason: String },
}
