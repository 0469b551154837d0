#![forbid(unsafe_code)]

//! Clear-key content key table.

use std::{collections::HashMap, fmt, sync::Arc};

use emekit_core::SessionId;
use parking_lot::RwLock;

use crate::{AES_BLOCK_SIZE, DrmError, DrmResult};

/// 128-bit content key.
pub type ContentKey = [u8; AES_BLOCK_SIZE];

/// Session-scoped content keys, shared between whoever processes the license
/// (a clear-key platform adapter, a test) and the clear-key engine factory.
///
/// Cloning is cheap (Arc increment); clones share the same table.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: Arc<RwLock<HashMap<SessionId, ContentKey>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the content key for a session.
    pub fn insert(&self, session_id: SessionId, key: ContentKey) {
        self.keys.write().insert(session_id, key);
    }

    /// Store a key given as raw bytes, validating its length.
    pub fn insert_slice(&self, session_id: SessionId, key: &[u8]) -> DrmResult<()> {
        let key: ContentKey = key
            .try_into()
            .map_err(|_| DrmError::InvalidKeyLength(key.len()))?;
        self.insert(session_id, key);
        Ok(())
    }

    pub fn get(&self, session_id: &SessionId) -> DrmResult<ContentKey> {
        self.keys
            .read()
            .get(session_id)
            .copied()
            .ok_or_else(|| DrmError::KeyNotFound(session_id.clone()))
    }

    pub fn remove(&self, session_id: &SessionId) -> Option<ContentKey> {
        self.keys.write().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("sessions", &self.len())
            .finish()
    }
}
