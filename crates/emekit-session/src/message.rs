#![forbid(unsafe_code)]

use bytes::Bytes;

/// License challenge handed to the consumer.
///
/// Empty when the platform signalled that no license exchange is needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyMessage {
    /// License request body, opaque to the controller.
    pub challenge: Bytes,
    /// License server URL the challenge must be sent to.
    pub destination_url: String,
}

impl KeyMessage {
    pub fn new(challenge: impl Into<Bytes>, destination_url: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            destination_url: destination_url.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.challenge.is_empty() && self.destination_url.is_empty()
    }
}

/// Latest asynchronous payload from the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum PendingMessage {
    #[default]
    Empty,
    Challenge(KeyMessage),
    KeyStatus(String),
    Error(String),
}

impl PendingMessage {
    /// Human-readable form returned to the consumer as diagnostics.
    pub(crate) fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Challenge(message) => String::from_utf8_lossy(&message.challenge).into_owned(),
            Self::KeyStatus(text) | Self::Error(text) => text.clone(),
        }
    }
}
