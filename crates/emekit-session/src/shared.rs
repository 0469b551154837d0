#![forbid(unsafe_code)]

//! Session slot shared between the controller and its notifier.

use std::time::{Duration, Instant};

use emekit_core::{SessionId, SessionState};
use emekit_events::{EventBus, SessionEvent};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{SessionError, SessionOptions, SessionResult, message::PendingMessage};

/// State, identity and pending payload, guarded together.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) state: SessionState,
    pub(crate) key_system: String,
    pub(crate) session_id: Option<SessionId>,
    pub(crate) pending: PendingMessage,
    /// Error reported to waiters once the state is `Error`.
    pub(crate) failure: Option<SessionError>,
    /// `create_session` is inside the adapter call.
    pub(crate) creating: bool,
    /// Controller dropped; notifications are refused.
    pub(crate) closed: bool,
}

impl Slot {
    fn new(key_system: String) -> Self {
        Self {
            state: SessionState::Init,
            key_system,
            session_id: None,
            pending: PendingMessage::Empty,
            failure: None,
            creating: false,
            closed: false,
        }
    }

    /// A challenge or ready signal can be accepted now.
    ///
    /// The adapter may answer before `create_session` returns the identity.
    pub(crate) fn awaiting_message(&self) -> bool {
        match self.state {
            SessionState::WaitingForMessage => true,
            SessionState::Init => self.creating,
            _ => false,
        }
    }

    /// Recorded failure, or `fallback` when none was recorded.
    pub(crate) fn failure_or(&self, fallback: SessionError) -> SessionError {
        self.failure.clone().unwrap_or(fallback)
    }
}

pub(crate) struct Shared {
    slot: Mutex<Slot>,
    condvar: Condvar,
    bus: EventBus,
    cancel: Option<CancellationToken>,
    poll_interval: Duration,
}

impl Shared {
    pub(crate) fn new(key_system: String, options: &SessionOptions) -> Self {
        let bus = options
            .bus
            .clone()
            .unwrap_or_else(|| EventBus::new(options.event_capacity));
        Self {
            slot: Mutex::new(Slot::new(key_system)),
            condvar: Condvar::new(),
            bus,
            cancel: options.cancel.clone(),
            poll_interval: options.poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock()
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Move to `to` and publish the transition. Caller wakes waiters.
    pub(crate) fn transition(&self, slot: &mut Slot, to: SessionState) {
        let from = slot.state;
        if from == to {
            return;
        }
        slot.state = to;
        debug!(from = %from, to = %to, session_id = ?slot.session_id, "key session transition");
        self.bus.publish(SessionEvent::StateChanged {
            session_id: slot.session_id.clone(),
            from,
            to,
        });
    }

    /// Record `error` and enter `Error`. Caller wakes waiters.
    pub(crate) fn fail(&self, slot: &mut Slot, error: SessionError) {
        slot.failure = Some(error);
        self.transition(slot, SessionState::Error);
    }

    pub(crate) fn wake(&self) {
        self.condvar.notify_all();
    }

    /// Block while `blocked` holds for the slot.
    ///
    /// Re-tests the predicate after every wake. Returns `Cancelled` or
    /// `Timeout` without touching the state.
    pub(crate) fn wait_while<F>(
        &self,
        slot: &mut MutexGuard<'_, Slot>,
        timeout: Option<Duration>,
        mut blocked: F,
    ) -> SessionResult<()>
    where
        F: FnMut(&Slot) -> bool,
    {
        let deadline = timeout.map(|timeout| (timeout, Instant::now() + timeout));
        while blocked(&**slot) {
            if slot.closed {
                return Err(SessionError::Closed);
            }
            if self
                .cancel
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                debug!(state = %slot.state, "key session wait cancelled");
                return Err(SessionError::Cancelled);
            }
            let mut wait = self.poll_interval;
            if let Some((timeout, deadline)) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    debug!(state = %slot.state, ?timeout, "key session wait timed out");
                    return Err(SessionError::Timeout(timeout));
                }
                wait = wait.min(deadline - now);
            }
            trace!(state = %slot.state, "waiting for platform notification");
            self.condvar.wait_for(slot, wait);
        }
        Ok(())
    }
}
