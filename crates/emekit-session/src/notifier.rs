#![forbid(unsafe_code)]

//! Adapter-facing notification entry points.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use emekit_core::{SessionId, SessionState};
use emekit_events::SessionEvent;
use parking_lot::MutexGuard;
use tracing::{debug, warn};

use crate::{
    KeyMessage, KeyStatus, SessionError, SessionResult,
    message::PendingMessage,
    shared::{Shared, Slot},
};

/// Handle the platform adapter uses to report asynchronous results.
///
/// Cloneable and callable from any thread. Every call names the session it
/// targets; notifications for another session are refused without touching
/// this one. All entry points wake every blocked consumer call.
#[derive(Clone)]
pub struct SessionNotifier {
    shared: Arc<Shared>,
}

impl SessionNotifier {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Platform reports the session usable without (further) license exchange.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` unless the session awaits a challenge or holds a
    /// license; the session then enters `Error`.
    pub fn on_ready(&self, session_id: &SessionId) -> SessionResult<()> {
        const NOTIFICATION: &str = "on_ready";
        let mut slot = self.shared.lock();
        self.admit(&slot, NOTIFICATION, session_id)?;

        let accepted = slot.awaiting_message()
            || matches!(
                slot.state,
                SessionState::UpdateLicense | SessionState::Ready
            );
        if !accepted {
            return Err(self.violation(slot, NOTIFICATION));
        }

        debug!(%session_id, "platform reports session ready");
        self.shared.transition(&mut slot, SessionState::Ready);
        drop(slot);
        self.shared.wake();
        Ok(())
    }

    /// Platform delivers a license challenge for the consumer to forward.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` outside `WaitingForMessage`; the session then
    /// enters `Error`.
    pub fn on_message(
        &self,
        session_id: &SessionId,
        message: impl Into<Bytes>,
        destination_url: impl Into<String>,
    ) -> SessionResult<()> {
        const NOTIFICATION: &str = "on_message";
        let mut slot = self.shared.lock();
        self.admit(&slot, NOTIFICATION, session_id)?;
        if !slot.awaiting_message() {
            return Err(self.violation(slot, NOTIFICATION));
        }

        let message = KeyMessage::new(message, destination_url);
        debug!(
            %session_id,
            challenge_len = message.challenge.len(),
            destination_url = %message.destination_url,
            "license challenge received"
        );
        self.shared.bus().publish(SessionEvent::ChallengeReceived {
            session_id: Some(session_id.clone()),
            challenge_len: message.challenge.len(),
            destination_url: message.destination_url.clone(),
        });
        slot.pending = PendingMessage::Challenge(message);
        self.shared.transition(&mut slot, SessionState::MessageReceived);
        drop(slot);
        self.shared.wake();
        Ok(())
    }

    /// Platform reports the status of the session's key.
    ///
    /// A usable key while waiting for the license moves to `UpdateLicense`;
    /// any other status (including an unusable key after the license was
    /// accepted) moves to `Error`.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` before a license was forwarded.
    pub fn on_key_status_update(&self, session_id: &SessionId, status: &str) -> SessionResult<()> {
        const NOTIFICATION: &str = "on_key_status_update";
        let mut slot = self.shared.lock();
        self.admit(&slot, NOTIFICATION, session_id)?;
        if !matches!(
            slot.state,
            SessionState::WaitingForLicense | SessionState::UpdateLicense | SessionState::Ready
        ) {
            return Err(self.violation(slot, NOTIFICATION));
        }

        let key_status = KeyStatus::parse(status);
        let usable = key_status.is_usable();
        debug!(%session_id, status, %key_status, usable, "key status update");
        self.shared.bus().publish(SessionEvent::KeyStatusChanged {
            session_id: Some(session_id.clone()),
            status: status.to_string(),
            usable,
        });

        slot.pending = PendingMessage::KeyStatus(status.to_string());
        if usable {
            if slot.state == SessionState::WaitingForLicense {
                self.shared.transition(&mut slot, SessionState::UpdateLicense);
            }
        } else {
            warn!(%session_id, status, state = %slot.state, "key not usable");
            self.shared.fail(
                &mut slot,
                SessionError::LicenseUpdateRejected {
                    status: status.to_string(),
                },
            );
        }
        drop(slot);
        self.shared.wake();
        Ok(())
    }

    /// Platform reports an out-of-band failure.
    ///
    /// Accepted in every state; a session already in `Error` keeps its first
    /// failure but exposes the newest message.
    ///
    /// # Errors
    ///
    /// Only identity mismatches and `Closed`.
    pub fn on_error(&self, session_id: &SessionId, code: u32, message: &str) -> SessionResult<()> {
        const NOTIFICATION: &str = "on_error";
        let mut slot = self.shared.lock();
        self.admit(&slot, NOTIFICATION, session_id)?;

        warn!(%session_id, code, error_message = message, state = %slot.state, "platform error");
        self.shared.bus().publish(SessionEvent::AdapterError {
            session_id: Some(session_id.clone()),
            code,
            message: message.to_string(),
        });

        slot.pending = PendingMessage::Error(message.to_string());
        if slot.state != SessionState::Error {
            self.shared.fail(
                &mut slot,
                SessionError::AdapterError {
                    code,
                    message: message.to_string(),
                },
            );
        }
        drop(slot);
        self.shared.wake();
        Ok(())
    }

    /// Refuse notifications after close or for another session.
    fn admit(
        &self,
        slot: &Slot,
        notification: &'static str,
        session_id: &SessionId,
    ) -> SessionResult<()> {
        if slot.closed {
            debug!(%session_id, notification, "notification after close");
            return Err(SessionError::Closed);
        }
        match slot.session_id {
            Some(ref expected) if expected != session_id => {
                warn!(%session_id, %expected, notification, "notification for foreign session");
                self.shared.bus().publish(SessionEvent::ProtocolViolation {
                    session_id: Some(session_id.clone()),
                    notification,
                    state: slot.state,
                });
                Err(SessionError::ProtocolViolation {
                    notification,
                    state: slot.state,
                    detail: format!("targets session {session_id}, this session is {expected}"),
                })
            }
            _ => Ok(()),
        }
    }

    /// Put the session into `Error` for an out-of-order notification.
    fn violation(
        &self,
        mut slot: MutexGuard<'_, Slot>,
        notification: &'static str,
    ) -> SessionError {
        let state = slot.state;
        let error = SessionError::ProtocolViolation {
            notification,
            state,
            detail: format!("not accepted in state {state}"),
        };
        warn!(notification, state = %state, session_id = ?slot.session_id, "protocol violation");
        self.shared.bus().publish(SessionEvent::ProtocolViolation {
            session_id: slot.session_id.clone(),
            notification,
            state,
        });
        if state != SessionState::Error {
            slot.pending = PendingMessage::Error(error.to_string());
            self.shared.fail(&mut slot, error.clone());
        }
        drop(slot);
        self.shared.wake();
        error
    }
}

impl fmt::Debug for SessionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.shared.lock();
        f.debug_struct("SessionNotifier")
            .field("session_id", &slot.session_id)
            .field("state", &slot.state)
            .finish()
    }
}
