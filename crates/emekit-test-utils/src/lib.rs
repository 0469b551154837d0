#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "test utility crate: unwraps are acceptable"
)]

//! Shared test utilities for the emekit workspace.

pub mod crypto;
pub mod engine;
pub mod fixtures;
pub mod platform;

pub use crypto::{encrypt_cbc, test_iv, test_key};
pub use engine::{CountingEngineFactory, XorEngine};
pub use fixtures::*;
pub use platform::{Notification, PlatformCall, ScriptedPlatform};
