#![forbid(unsafe_code)]

use emekit_core::SessionId;
use thiserror::Error;

/// Result type used by `emekit-drm`.
pub type DrmResult<T> = Result<T, DrmError>;

/// DRM decryption errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DrmError {
    #[error("AES-128-CBC decryption failed: {0}")]
    DecryptFailed(String),

    #[error("Invalid key length: expected 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid IV length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("No decryption engine registered for key system {0:?}")]
    UnknownKeySystem(String),

    #[error("No content key for session {0}")]
    KeyNotFound(SessionId),
}
