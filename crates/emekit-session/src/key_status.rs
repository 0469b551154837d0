#![forbid(unsafe_code)]

use std::fmt;

/// Key status reported by the platform.
///
/// Accepts both the platform spelling (`KeyUsable`) and the EME spelling
/// (`usable`). Only [`KeyStatus::Usable`] counts as success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    Usable,
    Expired,
    Released,
    OutputRestricted,
    InternalError,
    Other(String),
}

impl KeyStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "KeyUsable" | "usable" => Self::Usable,
            "KeyExpired" | "expired" => Self::Expired,
            "KeyReleased" | "released" => Self::Released,
            "KeyOutputRestricted" | "output-restricted" => Self::OutputRestricted,
            "KeyInternalError" | "internal-error" => Self::InternalError,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usable => f.write_str("usable"),
            Self::Expired => f.write_str("expired"),
            Self::Released => f.write_str("released"),
            Self::OutputRestricted => f.write_str("output-restricted"),
            Self::InternalError => f.write_str("internal-error"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}
