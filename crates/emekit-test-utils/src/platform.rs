//! Scripted platform adapter.
//!
//! Stands in for a platform DRM service: records every request and replies
//! through the session notifier from its own threads, after a configurable
//! delay, the way a real key system calls back.

use std::{collections::HashSet, sync::Arc, thread, time::Duration};

use bytes::Bytes;
use emekit_core::SessionId;
use emekit_drm::KeyStore;
use emekit_session::{
    PlatformAdapter, PlatformError, PlatformFactory, SessionNotifier, SessionResult,
};
use parking_lot::Mutex;
use tracing::debug;

/// Request recorded by [`ScriptedPlatform`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    SelectKeySystem(String),
    CreateSession { mime_type: String, init_data: Vec<u8> },
    UpdateSession { session_id: SessionId, response: Vec<u8> },
    ReleaseSession(SessionId),
    IsTypeSupported { key_system: String, mime_type: String },
}

/// Notification the platform delivers back to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Ready,
    Message { challenge: Bytes, destination_url: String },
    KeyStatus(String),
    Error { code: u32, message: String },
}

impl Notification {
    pub fn message(challenge: impl Into<Bytes>, destination_url: impl Into<String>) -> Self {
        Self::Message {
            challenge: challenge.into(),
            destination_url: destination_url.into(),
        }
    }

    pub fn key_status(status: impl Into<String>) -> Self {
        Self::KeyStatus(status.into())
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    fn deliver(&self, notifier: &SessionNotifier, session_id: &SessionId) -> SessionResult<()> {
        match self {
            Self::Ready => notifier.on_ready(session_id),
            Self::Message {
                challenge,
                destination_url,
            } => notifier.on_message(session_id, challenge.clone(), destination_url.clone()),
            Self::KeyStatus(status) => notifier.on_key_status_update(session_id, status),
            Self::Error { code, message } => notifier.on_error(session_id, *code, message),
        }
    }
}

struct Script {
    session_id: SessionId,
    delay: Duration,
    create_error: Option<PlatformError>,
    update_error: Option<PlatformError>,
    select_error: Option<PlatformError>,
    on_create: Vec<Notification>,
    on_update: Vec<Notification>,
    supported: HashSet<(String, String)>,
    key_store: Option<KeyStore>,
}

#[derive(Default)]
struct Record {
    calls: Vec<PlatformCall>,
    outcomes: Vec<(Notification, SessionResult<()>)>,
}

struct Inner {
    script: Mutex<Script>,
    record: Mutex<Record>,
    notifier: Mutex<Option<SessionNotifier>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

/// Platform factory and adapter in one, driven by a script.
///
/// ```ignore
/// let platform = ScriptedPlatform::new()
///     .on_create([Notification::message("REQ", "https://lic")])
///     .on_update([Notification::key_status("KeyUsable")]);
/// let session = KeySession::new(CLEAR_KEY, &platform, engines, options)?;
/// ```
///
/// Clones share the script and the record.
#[derive(Clone)]
pub struct ScriptedPlatform {
    inner: Arc<Inner>,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(Script {
                    session_id: SessionId::from("abc123"),
                    delay: Duration::from_millis(10),
                    create_error: None,
                    update_error: None,
                    select_error: None,
                    on_create: Vec::new(),
                    on_update: Vec::new(),
                    supported: HashSet::new(),
                    key_store: None,
                }),
                record: Mutex::new(Record::default()),
                notifier: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identity returned by `create_session`.
    #[must_use]
    pub fn with_session_id(self, session_id: impl Into<SessionId>) -> Self {
        self.inner.script.lock().session_id = session_id.into();
        self
    }

    /// Delay before each scripted notification batch.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.script.lock().delay = delay;
        self
    }

    #[must_use]
    pub fn fail_create(self, error: PlatformError) -> Self {
        self.inner.script.lock().create_error = Some(error);
        self
    }

    #[must_use]
    pub fn fail_update(self, error: PlatformError) -> Self {
        self.inner.script.lock().update_error = Some(error);
        self
    }

    #[must_use]
    pub fn fail_select(self, error: PlatformError) -> Self {
        self.inner.script.lock().select_error = Some(error);
        self
    }

    /// Notifications delivered after `create_session` returns.
    #[must_use]
    pub fn on_create(self, notifications: impl IntoIterator<Item = Notification>) -> Self {
        self.inner.script.lock().on_create = notifications.into_iter().collect();
        self
    }

    /// Notifications delivered after `update_session` returns.
    #[must_use]
    pub fn on_update(self, notifications: impl IntoIterator<Item = Notification>) -> Self {
        self.inner.script.lock().on_update = notifications.into_iter().collect();
        self
    }

    #[must_use]
    pub fn supporting(self, key_system: &str, mime_type: &str) -> Self {
        self.inner
            .script
            .lock()
            .supported
            .insert((key_system.to_string(), mime_type.to_string()));
        self
    }

    /// Act as a clear-key CDM: a license response is the raw content key.
    ///
    /// A valid 16-byte key is stored for the session and reported
    /// `KeyUsable`; anything else is reported `KeyInternalError`. Replaces
    /// the `on_update` script.
    #[must_use]
    pub fn with_clear_key(self, store: KeyStore) -> Self {
        self.inner.script.lock().key_store = Some(store);
        self
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.inner.record.lock().calls.clone()
    }

    /// Delivered notifications with the result the session returned.
    pub fn outcomes(&self) -> Vec<(Notification, SessionResult<()>)> {
        self.inner.record.lock().outcomes.clone()
    }

    /// Notifier captured when the session was built.
    pub fn notifier(&self) -> SessionNotifier {
        self.inner.notifier.lock().clone().unwrap()
    }

    /// Wait until every scripted notification has been delivered.
    pub fn join(&self) {
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            worker.join().unwrap();
        }
    }

    fn record(&self, call: PlatformCall) {
        self.inner.record.lock().calls.push(call);
    }

    fn schedule(&self, session_id: SessionId, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let Some(notifier) = self.inner.notifier.lock().clone() else {
            return;
        };
        let delay = self.inner.script.lock().delay;
        let inner = Arc::clone(&self.inner);
        let worker = thread::spawn(move || {
            thread::sleep(delay);
            for notification in notifications {
                let outcome = notification.deliver(&notifier, &session_id);
                debug!(?notification, ?outcome, "scripted notification delivered");
                inner.record.lock().outcomes.push((notification, outcome));
            }
        });
        self.inner.workers.lock().push(worker);
    }
}

impl PlatformFactory for ScriptedPlatform {
    fn create(
        &self,
        _key_system: &str,
        notifier: SessionNotifier,
    ) -> Result<Box<dyn PlatformAdapter>, PlatformError> {
        *self.inner.notifier.lock() = Some(notifier);
        Ok(Box::new(self.clone()))
    }
}

impl PlatformAdapter for ScriptedPlatform {
    fn select_key_system(&self, key_system: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::SelectKeySystem(key_system.to_string()));
        match self.inner.script.lock().select_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_session(
        &self,
        mime_type: &str,
        init_data: &[u8],
    ) -> Result<SessionId, PlatformError> {
        self.record(PlatformCall::CreateSession {
            mime_type: mime_type.to_string(),
            init_data: init_data.to_vec(),
        });
        let (session_id, notifications) = {
            let script = self.inner.script.lock();
            if let Some(ref error) = script.create_error {
                return Err(error.clone());
            }
            (script.session_id.clone(), script.on_create.clone())
        };
        self.schedule(session_id.clone(), notifications);
        Ok(session_id)
    }

    fn update_session(
        &self,
        session_id: &SessionId,
        response: &[u8],
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::UpdateSession {
            session_id: session_id.clone(),
            response: response.to_vec(),
        });
        let notifications = {
            let script = self.inner.script.lock();
            if let Some(ref error) = script.update_error {
                return Err(error.clone());
            }
            match script.key_store {
                Some(ref store) => {
                    let status = match store.insert_slice(session_id.clone(), response) {
                        Ok(()) => "KeyUsable",
                        Err(_) => "KeyInternalError",
                    };
                    vec![Notification::key_status(status)]
                }
                None => script.on_update.clone(),
            }
        };
        self.schedule(session_id.clone(), notifications);
        Ok(())
    }

    fn release_session(&self, session_id: &SessionId) -> Result<(), PlatformError> {
        self.record(PlatformCall::ReleaseSession(session_id.clone()));
        if let Some(ref store) = self.inner.script.lock().key_store {
            store.remove(session_id);
        }
        Ok(())
    }

    fn is_type_supported(&self, key_system: &str, mime_type: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::IsTypeSupported {
            key_system: key_system.to_string(),
            mime_type: mime_type.to_string(),
        });
        let supported = self
            .inner
            .script
            .lock()
            .supported
            .contains(&(key_system.to_string(), mime_type.to_string()));
        if supported {
            Ok(())
        } else {
            Err(PlatformError::new(
                1,
                format!("{mime_type} not supported by {key_system}"),
            ))
        }
    }
}
