// Common fixtures and helpers for integration tests

use std::sync::Arc;

use emekit_core::CLEAR_KEY;
use emekit_drm::EngineFactory;
use emekit_session::{KeySession, SessionOptions};
use emekit_test_utils::{CountingEngineFactory, ScriptedPlatform};

pub const MIME_TYPE: &str = "video/mp4";
pub const INIT_DATA: &[u8] = b"pssh-box-16bytes";
pub const LICENSE_URL: &str = "https://license.example.com/clearkey";

/// Clear-key session backed by `platform` and XOR engines.
pub fn xor_session(platform: &ScriptedPlatform, engines: &CountingEngineFactory) -> KeySession {
    session_with(platform, Arc::new(engines.clone()), SessionOptions::default())
}

pub fn session_with(
    platform: &ScriptedPlatform,
    engines: Arc<dyn EngineFactory>,
    options: SessionOptions,
) -> KeySession {
    KeySession::new(CLEAR_KEY, platform, engines, options).unwrap()
}
