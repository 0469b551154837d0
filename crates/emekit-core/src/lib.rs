#![forbid(unsafe_code)]

//! Shared vocabulary for the emekit workspace.
//!
//! - [`SessionId`]: opaque, platform-issued key session identity
//! - [`SessionState`]: the key session state machine states
//! - key-system identifiers known to the workspace ([`CLEAR_KEY`])

mod session_id;
mod state;

pub use session_id::SessionId;
pub use state::SessionState;

/// W3C Clear Key key-system identifier.
pub const CLEAR_KEY: &str = "org.w3.clearkey";
