#![forbid(unsafe_code)]

//! Consumer-facing key session controller.

use std::{fmt, sync::Arc, time::Duration};

use emekit_core::{SessionId, SessionState};
use emekit_drm::{DecryptionEngine, EngineFactory};
use emekit_events::{DrmEvent, Event, EventBus};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::{
    KeyMessage, OutputField, PlatformAdapter, PlatformFactory, SessionError, SessionNotifier,
    SessionOptions, SessionResult, message::PendingMessage, shared::Shared,
};

/// Blocking controller for one key session.
///
/// Drives the license exchange with the platform adapter and decrypts
/// samples once a usable key exists. Consumer calls block on the shared
/// condvar until the adapter reports through [`SessionNotifier`].
///
/// `KeySession` is `Send + Sync`; wrap it in an `Arc` to decrypt from
/// several threads.
pub struct KeySession {
    shared: Arc<Shared>,
    platform: Box<dyn PlatformAdapter>,
    engines: Arc<dyn EngineFactory>,
    engine: Mutex<Option<Arc<dyn DecryptionEngine>>>,
    wait_timeout: Option<Duration>,
}

impl KeySession {
    /// Build a controller bound to `key_system`.
    ///
    /// The platform factory receives the notifier for this session.
    ///
    /// # Errors
    ///
    /// `AdapterError` when the platform adapter cannot be created.
    pub fn new(
        key_system: impl Into<String>,
        platforms: &dyn PlatformFactory,
        engines: Arc<dyn EngineFactory>,
        options: SessionOptions,
    ) -> SessionResult<Self> {
        let key_system = key_system.into();
        let shared = Arc::new(Shared::new(key_system.clone(), &options));
        let platform = platforms
            .create(&key_system, SessionNotifier::new(Arc::clone(&shared)))
            .inspect_err(|e| warn!(%key_system, error = %e, "platform adapter unavailable"))?;
        debug!(%key_system, "key session created");
        Ok(Self {
            shared,
            platform,
            engines,
            engine: Mutex::new(None),
            wait_timeout: options.wait_timeout,
        })
    }

    /// Rebind to another key system and start over from `Init`.
    ///
    /// Releases the current session identity and engine. Callers must not
    /// invoke this while another thread is mid-exchange; blocked calls are
    /// woken and fail with `InvalidState`.
    ///
    /// # Errors
    ///
    /// `AdapterError` when the adapter refuses the key system; nothing is
    /// reset in that case.
    pub fn select_key_system(&self, key_system: &str) -> SessionResult<()> {
        self.platform.select_key_system(key_system)?;

        let previous = {
            let mut slot = self.shared.lock();
            let previous = slot.session_id.take();
            slot.key_system = key_system.to_string();
            slot.pending = PendingMessage::Empty;
            slot.failure = None;
            slot.creating = false;
            self.shared.transition(&mut slot, SessionState::Init);
            previous
        };
        self.shared.wake();
        self.engine.lock().take();

        debug!(key_system, previous = ?previous, "key system selected");
        if let Some(session_id) = previous {
            self.release(&session_id);
        }
        Ok(())
    }

    /// Attach to a session negotiated elsewhere, for decrypt-only use.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside `Init`.
    pub fn select_session(&self, session_id: SessionId) -> SessionResult<()> {
        let mut slot = self.shared.lock();
        if slot.state != SessionState::Init || slot.creating {
            return Err(SessionError::InvalidState {
                op: "select_session",
                state: slot.state,
            });
        }
        debug!(%session_id, "attaching to existing session");
        slot.session_id = Some(session_id);
        self.shared.transition(&mut slot, SessionState::Ready);
        drop(slot);
        self.shared.wake();
        Ok(())
    }

    /// Ask the platform to open a session for `init_data`.
    ///
    /// Returns the platform-issued identity and moves to
    /// `WaitingForMessage`, unless the adapter already notified while the
    /// call was in flight.
    ///
    /// # Errors
    ///
    /// - `InvalidState` outside `Init`
    /// - `SessionCreationFailed` when the adapter fails; the session enters
    ///   `Error`
    /// - the recorded failure when the adapter reported an error while the
    ///   call was in flight
    pub fn create_session(&self, mime_type: &str, init_data: &[u8]) -> SessionResult<SessionId> {
        {
            let mut slot = self.shared.lock();
            if slot.state != SessionState::Init || slot.creating {
                return Err(SessionError::InvalidState {
                    op: "create_session",
                    state: slot.state,
                });
            }
            slot.creating = true;
        }

        debug!(mime_type, init_data_len = init_data.len(), "creating key session");
        let response = self.platform.create_session(mime_type, init_data);

        let mut slot = self.shared.lock();
        slot.creating = false;
        let result = match response {
            Ok(session_id) => {
                slot.session_id = Some(session_id.clone());
                match slot.state {
                    SessionState::Init => {
                        self.shared
                            .transition(&mut slot, SessionState::WaitingForMessage);
                        Ok(session_id)
                    }
                    SessionState::Error => Err(slot.failure_or(SessionError::InvalidState {
                        op: "create_session",
                        state: SessionState::Error,
                    })),
                    // Challenge or ready delivered during the call.
                    _ => Ok(session_id),
                }
            }
            Err(e) => {
                warn!(mime_type, error = %e, "session creation failed");
                let error = SessionError::SessionCreationFailed {
                    reason: e.to_string(),
                };
                slot.pending = PendingMessage::Error(e.message);
                self.shared.fail(&mut slot, error.clone());
                Err(error)
            }
        };
        drop(slot);
        self.shared.wake();
        result
    }

    /// Block until the platform delivers a challenge.
    ///
    /// Waits up to the configured `wait_timeout`. An empty message means the
    /// session became ready without a license exchange.
    ///
    /// # Errors
    ///
    /// The recorded failure in `Error`, `Timeout`, `Cancelled`, or
    /// `InvalidState` when no challenge can arrive in the current state.
    pub fn get_key_message(&self) -> SessionResult<KeyMessage> {
        self.take_key_message(self.wait_timeout, |message| Ok(message.clone()))
    }

    /// [`get_key_message`](Self::get_key_message) with an explicit deadline.
    pub fn get_key_message_within(&self, timeout: Duration) -> SessionResult<KeyMessage> {
        self.take_key_message(Some(timeout), |message| Ok(message.clone()))
    }

    /// Copy the challenge and destination URL into caller buffers.
    ///
    /// Returns the number of bytes written to each buffer.
    ///
    /// # Errors
    ///
    /// `TruncatedOutputBuffer` when either buffer is too small. Nothing is
    /// written and the challenge stays available for a retry.
    pub fn get_key_message_into(
        &self,
        challenge: &mut [u8],
        destination_url: &mut [u8],
    ) -> SessionResult<(usize, usize)> {
        self.take_key_message(self.wait_timeout, |message| {
            let url = message.destination_url.as_bytes();
            check_capacity(OutputField::Challenge, message.challenge.len(), challenge.len())?;
            check_capacity(OutputField::DestinationUrl, url.len(), destination_url.len())?;
            challenge[..message.challenge.len()].copy_from_slice(&message.challenge);
            destination_url[..url.len()].copy_from_slice(url);
            Ok((message.challenge.len(), url.len()))
        })
    }

    fn take_key_message<R>(
        &self,
        timeout: Option<Duration>,
        deliver: impl FnOnce(&KeyMessage) -> SessionResult<R>,
    ) -> SessionResult<R> {
        const OP: &str = "get_key_message";
        let mut slot = self.shared.lock();
        if matches!(
            slot.state,
            SessionState::Init | SessionState::WaitingForLicense | SessionState::UpdateLicense
        ) && !slot.creating
        {
            return Err(SessionError::InvalidState {
                op: OP,
                state: slot.state,
            });
        }

        self.shared.wait_while(&mut slot, timeout, |s| s.awaiting_message())?;

        match slot.state {
            SessionState::MessageReceived => {
                let message = match slot.pending {
                    PendingMessage::Challenge(ref message) => message.clone(),
                    _ => KeyMessage::default(),
                };
                let delivered = deliver(&message)?;
                self.shared
                    .transition(&mut slot, SessionState::WaitingForLicense);
                drop(slot);
                self.shared.wake();
                Ok(delivered)
            }
            SessionState::Ready => deliver(&KeyMessage::default()),
            SessionState::Error => Err(slot.failure_or(SessionError::InvalidState {
                op: OP,
                state: SessionState::Error,
            })),
            state => Err(SessionError::InvalidState { op: OP, state }),
        }
    }

    /// Forward a license server response and wait for the key status.
    ///
    /// Waits up to the configured `wait_timeout`. Returns the platform's
    /// latest message (normally the key status) as diagnostics. A key status
    /// that arrived before the call has already resolved the wait: the
    /// response is still forwarded and the call returns at once.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless a challenge was retrieved
    /// - `AdapterError` when the adapter refuses the response
    /// - `LicenseUpdateRejected` when the key is not usable
    /// - `Timeout` / `Cancelled`
    pub fn update(&self, response: &[u8]) -> SessionResult<String> {
        self.forward_license(response, self.wait_timeout)
    }

    /// [`update`](Self::update) with an explicit deadline.
    pub fn update_within(&self, response: &[u8], timeout: Duration) -> SessionResult<String> {
        self.forward_license(response, Some(timeout))
    }

    fn forward_license(
        &self,
        response: &[u8],
        timeout: Option<Duration>,
    ) -> SessionResult<String> {
        const OP: &str = "update";
        let session_id = {
            let slot = self.shared.lock();
            match (slot.state, slot.session_id.clone()) {
                (
                    SessionState::WaitingForLicense
                    | SessionState::UpdateLicense
                    | SessionState::Ready,
                    Some(session_id),
                ) => session_id,
                (SessionState::Error, _) => {
                    return Err(slot.failure_or(SessionError::InvalidState {
                        op: OP,
                        state: SessionState::Error,
                    }));
                }
                (state, _) => return Err(SessionError::InvalidState { op: OP, state }),
            }
        };

        debug!(%session_id, response_len = response.len(), "forwarding license response");
        if let Err(e) = self.platform.update_session(&session_id, response) {
            warn!(%session_id, error = %e, "license update refused by platform");
            let mut slot = self.shared.lock();
            let error = if slot.state == SessionState::Error {
                slot.failure_or(e.into())
            } else {
                let error = SessionError::from(e.clone());
                slot.pending = PendingMessage::Error(e.message);
                self.shared.fail(&mut slot, error.clone());
                error
            };
            drop(slot);
            self.shared.wake();
            return Err(error);
        }

        let mut slot = self.shared.lock();
        self.shared.wait_while(&mut slot, timeout, |s| {
            s.state == SessionState::WaitingForLicense
        })?;
        match slot.state {
            SessionState::UpdateLicense | SessionState::Ready => Ok(slot.pending.text()),
            SessionState::Error => Err(slot.failure_or(SessionError::LicenseUpdateRejected {
                status: slot.pending.text(),
            })),
            state => Err(SessionError::InvalidState { op: OP, state }),
        }
    }

    /// Decrypt `data` in place with the session's key.
    ///
    /// The engine is built on first use; later calls reuse it. Returns the
    /// number of bytes decrypted.
    ///
    /// # Errors
    ///
    /// `EngineUnavailable` before a usable key exists or when the engine
    /// factory fails, `Decrypt` for engine failures.
    pub fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> SessionResult<usize> {
        let engine = self.engine()?;
        trace!(iv_len = iv.len(), len = data.len(), "decrypt");
        Ok(engine.decrypt(iv, data)?)
    }

    /// Hint the engine to free cached memory. No-op before the engine exists.
    ///
    /// # Errors
    ///
    /// `Decrypt` when the engine reports a failure.
    pub fn release_mem(&self) -> SessionResult<()> {
        let engine = self.engine.lock().clone();
        if let Some(engine) = engine {
            engine.release_mem()?;
        }
        Ok(())
    }

    fn engine(&self) -> SessionResult<Arc<dyn DecryptionEngine>> {
        let mut engine = self.engine.lock();
        if let Some(ref engine) = *engine {
            return Ok(Arc::clone(engine));
        }

        let (key_system, session_id) = {
            let slot = self.shared.lock();
            match (slot.state.allows_decrypt(), slot.session_id.clone()) {
                (true, Some(session_id)) => (slot.key_system.clone(), session_id),
                (_, session_id) => {
                    let reason = if session_id.is_none() {
                        "no session established".to_string()
                    } else {
                        format!("no usable key in state {}", slot.state)
                    };
                    return Err(SessionError::EngineUnavailable {
                        key_system: slot.key_system.clone(),
                        reason,
                    });
                }
            }
        };

        let created: Arc<dyn DecryptionEngine> =
            match self.engines.create(&key_system, &session_id) {
                Ok(created) => Arc::from(created),
                Err(e) => {
                    warn!(%key_system, %session_id, error = %e, "decryption engine unavailable");
                    self.shared.bus().publish(DrmEvent::EngineUnavailable {
                        key_system: key_system.clone(),
                        reason: e.to_string(),
                    });
                    return Err(SessionError::EngineUnavailable {
                        key_system,
                        reason: e.to_string(),
                    });
                }
            };
        debug!(%key_system, %session_id, "decryption engine created");
        self.shared.bus().publish(DrmEvent::EngineCreated {
            key_system,
            session_id,
        });
        *engine = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Whether `key_system` can handle `mime_type` on this platform.
    pub fn is_type_supported(&self, key_system: &str, mime_type: &str) -> bool {
        match self.platform.is_type_supported(key_system, mime_type) {
            Ok(()) => true,
            Err(e) => {
                debug!(key_system, mime_type, error = %e, "type not supported");
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.lock().session_id.clone()
    }

    pub fn key_system(&self) -> String {
        self.shared.lock().key_system.clone()
    }

    /// Latest platform payload as text: the challenge, key status, or error
    /// message.
    pub fn last_message(&self) -> String {
        self.shared.lock().pending.text()
    }

    /// Notifier handle for this session.
    pub fn notifier(&self) -> SessionNotifier {
        SessionNotifier::new(Arc::clone(&self.shared))
    }

    pub fn events(&self) -> &EventBus {
        self.shared.bus()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus().subscribe()
    }

    fn release(&self, session_id: &SessionId) {
        if let Err(e) = self.platform.release_session(session_id) {
            warn!(%session_id, error = %e, "failed to release key session");
        } else {
            debug!(%session_id, "key session released");
        }
    }
}

fn check_capacity(field: OutputField, needed: usize, available: usize) -> SessionResult<()> {
    if needed > available {
        return Err(SessionError::TruncatedOutputBuffer {
            field,
            needed,
            available,
        });
    }
    Ok(())
}

impl Drop for KeySession {
    fn drop(&mut self) {
        self.engine.get_mut().take();
        let session_id = {
            let mut slot = self.shared.lock();
            slot.closed = true;
            slot.session_id.clone()
        };
        self.shared.wake();
        if let Some(session_id) = session_id {
            self.release(&session_id);
        }
    }
}

impl fmt::Debug for KeySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.engine.lock().is_some();
        let slot = self.shared.lock();
        f.debug_struct("KeySession")
            .field("key_system", &slot.key_system)
            .field("session_id", &slot.session_id)
            .field("state", &slot.state)
            .field("engine", &engine)
            .finish_non_exhaustive()
    }
}
