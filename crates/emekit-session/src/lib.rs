#![forbid(unsafe_code)]

//! Blocking key session controller.
//!
//! [`KeySession`] turns the asynchronous, notification-driven license
//! exchange of a platform key system into blocking calls:
//!
//! 1. `create_session(mime_type, init_data)` opens a session on the platform
//! 2. `get_key_message()` blocks until the platform delivers a challenge
//! 3. the consumer posts the challenge to the license server itself
//! 4. `update(response)` forwards the license and blocks for the key status
//! 5. `decrypt(iv, data)` builds the decryption engine on first use
//!
//! The platform adapter reports back through [`SessionNotifier`] from its own
//! threads. State transitions and platform notifications are published on the
//! session's [`EventBus`](emekit_events::EventBus).

mod error;
mod key_status;
mod message;
mod notifier;
mod options;
mod platform;
mod session;
mod shared;

pub use error::{OutputField, SessionError, SessionResult};
pub use key_status::KeyStatus;
pub use message::KeyMessage;
pub use notifier::SessionNotifier;
pub use options::{DEFAULT_POLL_INTERVAL, SessionOptions};
#[cfg(any(test, feature = "test-utils"))]
pub use platform::PlatformAdapterMock;
pub use platform::{PlatformAdapter, PlatformError, PlatformFactory};
pub use session::KeySession;

pub use emekit_core::{SessionId, SessionState};
