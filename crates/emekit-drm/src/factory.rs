#![forbid(unsafe_code)]

//! Engine construction keyed by key-system id.

use std::{collections::HashMap, fmt};

use emekit_core::{CLEAR_KEY, SessionId};
use tracing::debug;

use crate::{Aes128CbcEngine, DecryptionEngine, DrmError, DrmResult, KeyStore};

/// Builds the decryption engine for a negotiated session.
pub trait EngineFactory: Send + Sync {
    /// Construct an engine for `session_id` under `key_system`.
    ///
    /// # Errors
    ///
    /// Returns [`DrmError::UnknownKeySystem`] when no engine exists for the
    /// key system, or whatever the engine reports when it cannot be set up
    /// (e.g. [`DrmError::KeyNotFound`]).
    fn create(&self, key_system: &str, session_id: &SessionId)
    -> DrmResult<Box<dyn DecryptionEngine>>;
}

/// Constructor registered for one key system.
pub type EngineConstructor =
    Box<dyn Fn(&SessionId) -> DrmResult<Box<dyn DecryptionEngine>> + Send + Sync>;

/// [`EngineFactory`] dispatching on the key-system id.
///
/// ```ignore
/// let store = KeyStore::new();
/// let registry = EngineRegistry::with_clear_key(store.clone())
///     .register("com.example.drm", |session_id| vendor_engine(session_id));
/// ```
#[derive(Default)]
pub struct EngineRegistry {
    constructors: HashMap<String, EngineConstructor>,
}

impl EngineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the AES-128-CBC engine registered under
    /// [`CLEAR_KEY`], reading content keys from `store`.
    #[must_use]
    pub fn with_clear_key(store: KeyStore) -> Self {
        Self::new().register(CLEAR_KEY, move |session_id| {
            let key = store.get(session_id)?;
            Ok(Box::new(Aes128CbcEngine::new(key)) as Box<dyn DecryptionEngine>)
        })
    }

    /// Register (or replace) the constructor for `key_system`.
    #[must_use]
    pub fn register<F>(mut self, key_system: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&SessionId) -> DrmResult<Box<dyn DecryptionEngine>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(key_system.into(), Box::new(constructor));
        self
    }

    pub fn supports(&self, key_system: &str) -> bool {
        self.constructors.contains_key(key_system)
    }
}

impl EngineFactory for EngineRegistry {
    fn create(
        &self,
        key_system: &str,
        session_id: &SessionId,
    ) -> DrmResult<Box<dyn DecryptionEngine>> {
        let constructor = self
            .constructors
            .get(key_system)
            .ok_or_else(|| DrmError::UnknownKeySystem(key_system.to_string()))?;
        debug!(key_system, %session_id, "constructing decryption engine");
        constructor(session_id)
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut key_systems: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        key_systems.sort_unstable();
        f.debug_struct("EngineRegistry")
            .field("key_systems", &key_systems)
            .finish()
    }
}
