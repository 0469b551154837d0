#![forbid(unsafe_code)]

use std::{fmt, time::Duration};

use emekit_core::SessionState;
use emekit_drm::DrmError;
use thiserror::Error;

use crate::PlatformError;

/// Result type used by `emekit-session`.
pub type SessionResult<T> = Result<T, SessionError>;

/// Caller-supplied output buffer named in [`SessionError::TruncatedOutputBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputField {
    Challenge,
    DestinationUrl,
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Challenge => f.write_str("challenge"),
            Self::DestinationUrl => f.write_str("destination URL"),
        }
    }
}

/// Key session errors.
///
/// None of these are retried internally; the consumer owns retry policy.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session creation failed: {reason}")]
    SessionCreationFailed { reason: String },

    #[error("license update rejected, key status {status:?}")]
    LicenseUpdateRejected { status: String },

    #[error("{field} buffer too small: need {needed} bytes, have {available}")]
    TruncatedOutputBuffer {
        field: OutputField,
        needed: usize,
        available: usize,
    },

    #[error("decryption engine unavailable for {key_system:?}: {reason}")]
    EngineUnavailable { key_system: String, reason: String },

    #[error("protocol violation: {notification} in state {state}: {detail}")]
    ProtocolViolation {
        notification: &'static str,
        state: SessionState,
        detail: String,
    },

    #[error("platform error {code}: {message}")]
    AdapterError { code: u32, message: String },

    #[error("{op} is not valid in state {state}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },

    #[error("timed out after {0:?} waiting for the platform")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("key session closed")]
    Closed,

    #[error(transparent)]
    Decrypt(#[from] DrmError),
}

impl From<PlatformError> for SessionError {
    fn from(e: PlatformError) -> Self {
        Self::AdapterError {
            code: e.code,
            message: e.message,
        }
    }
}
