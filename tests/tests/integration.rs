//! All integration tests for emekit
#![expect(
    clippy::unwrap_used,
    reason = "integration test crate: unwraps are acceptable in test code"
)]

mod common;
mod emekit_drm;
mod emekit_session;
