#![forbid(unsafe_code)]

//! Platform key-system adapter boundary.

use emekit_core::SessionId;
use thiserror::Error;

use crate::SessionNotifier;

/// Failure status reported by a platform adapter call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("platform call failed ({code}): {message}")]
pub struct PlatformError {
    pub code: u32,
    pub message: String,
}

impl PlatformError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Adapter negotiating with a platform DRM service.
///
/// Request-issuing calls return synchronously; results (challenges, key
/// statuses, failures) arrive later through the [`SessionNotifier`] the
/// adapter was built with, from the adapter's own threads. Implementations
/// may also notify from inside a request call: the controller never holds
/// its lock across a call into the adapter.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = PlatformAdapterMock)
)]
pub trait PlatformAdapter: Send + Sync {
    /// Rebind the adapter to another key system.
    fn select_key_system(&self, key_system: &str) -> Result<(), PlatformError>;

    /// Open a key session for `init_data` and return its identity.
    fn create_session(&self, mime_type: &str, init_data: &[u8])
    -> Result<SessionId, PlatformError>;

    /// Forward a license server response to the session.
    fn update_session(&self, session_id: &SessionId, response: &[u8])
    -> Result<(), PlatformError>;

    /// Release the platform resources held for the session.
    fn release_session(&self, session_id: &SessionId) -> Result<(), PlatformError>;

    /// `Ok(())` when the key system can handle `mime_type`.
    fn is_type_supported(&self, key_system: &str, mime_type: &str) -> Result<(), PlatformError>;
}

/// Builds the platform adapter for a key system.
///
/// The adapter keeps `notifier` to deliver notifications into the session
/// that requested it.
pub trait PlatformFactory {
    fn create(
        &self,
        key_system: &str,
        notifier: SessionNotifier,
    ) -> Result<Box<dyn PlatformAdapter>, PlatformError>;
}
