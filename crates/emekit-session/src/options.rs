#![forbid(unsafe_code)]

//! Configuration for [`KeySession`](crate::KeySession).

use std::time::Duration;

use derive_setters::Setters;
use emekit_events::EventBus;
use tokio_util::sync::CancellationToken;

/// Default condvar re-check interval for blocking calls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Options for a [`KeySession`](crate::KeySession).
///
/// ```ignore
/// let options = SessionOptions::default()
///     .with_wait_timeout(Duration::from_secs(10))
///     .with_cancel(token.clone());
/// ```
#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct SessionOptions {
    /// Default deadline for `get_key_message` and `update`.
    ///
    /// `None` waits until the platform delivers a notification.
    pub wait_timeout: Option<Duration>,
    /// Cancels blocked calls with `SessionError::Cancelled`.
    pub cancel: Option<CancellationToken>,
    /// Bus that receives session and decryption events.
    ///
    /// When `None`, a fresh bus with `event_capacity` slots is created.
    #[setters(rename = "with_events")]
    pub bus: Option<EventBus>,
    /// Capacity of the bus created when `bus` is `None`.
    pub event_capacity: usize,
    /// How often a blocked call re-checks cancellation and deadlines.
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            wait_timeout: None,
            cancel: None,
            bus: None,
            event_capacity: 32,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
