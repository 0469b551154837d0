#![forbid(unsafe_code)]

use std::fmt;

/// Key session state.
///
/// `Init` is the entry state. `Error` is terminal: only re-selecting the key
/// system (which resets to `Init`) leaves it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session created yet.
    #[default]
    Init,
    /// Session created, waiting for the platform to produce a challenge.
    WaitingForMessage,
    /// Challenge stored, waiting for the consumer to pick it up.
    MessageReceived,
    /// Challenge handed out, waiting for the license key status.
    WaitingForLicense,
    /// License accepted, key usable.
    UpdateLicense,
    /// Session usable without (further) license exchange.
    Ready,
    /// Session failed.
    Error,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error)
    }

    /// States in which a decryption engine may be constructed and used.
    pub fn allows_decrypt(self) -> bool {
        matches!(self, Self::UpdateLicense | Self::Ready)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::WaitingForMessage => "waiting-for-message",
            Self::MessageReceived => "message-received",
            Self::WaitingForLicense => "waiting-for-license",
            Self::UpdateLicense => "update-license",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
