#![forbid(unsafe_code)]

//! Event bus for emekit key sessions.

mod bus;
mod drm;
mod event;
mod session;

pub use bus::{EventBus, SessionSubscription};
pub use drm::DrmEvent;
pub use event::Event;
pub use session::SessionEvent;
