#![forbid(unsafe_code)]

use emekit_core::SessionId;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use crate::Event;

/// Event bus shared by one or more key sessions and their observers.
///
/// `publish()` is a sync call, so the platform adapter's callback threads and
/// the consumer thread can both publish without a runtime.
/// If there are no subscribers, events are silently dropped.
///
/// Several sessions may publish into one bus (see `SessionOptions::bus`);
/// [`subscribe_session`](Self::subscribe_session) narrows a subscription to
/// one of them.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all subscribers.
    ///
    /// Accepts sub-enum values directly: `bus.publish(DrmEvent::...)`.
    pub fn publish<E: Into<Event>>(&self, event: E) {
        let _ = self.tx.send(event.into());
    }

    /// Subscribe to all future events.
    ///
    /// Slow subscribers receive `RecvError::Lagged(n)` instead of blocking
    /// the session.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Subscribe to future events of one session only.
    #[must_use]
    pub fn subscribe_session(&self, session_id: SessionId) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
            session_id,
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver yielding only the events tagged with one session.
///
/// Events without a session identity, such as engine failures, are skipped.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: broadcast::Receiver<Event>,
    session_id: SessionId,
}

impl SessionSubscription {
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Wait for the next event of this session.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged` when the subscriber fell behind, `Closed` once
    /// every publisher is gone.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.session_id() == Some(&self.session_id) {
                return Ok(event);
            }
        }
    }

    /// Next buffered event of this session, without waiting.
    ///
    /// # Errors
    ///
    /// `TryRecvError::Empty` once no event of this session is buffered.
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if event.session_id() == Some(&self.session_id) {
                return Ok(event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(32)
    }
}
