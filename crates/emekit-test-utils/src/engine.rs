//! Engine factories with observable construction.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use emekit_core::SessionId;
use emekit_drm::{DecryptionEngine, DrmResult, EngineFactory};

/// Engine that XORs every byte with a constant.
#[derive(Clone, Copy, Debug)]
pub struct XorEngine(pub u8);

impl DecryptionEngine for XorEngine {
    fn decrypt(&self, _iv: &[u8], data: &mut [u8]) -> DrmResult<usize> {
        for byte in data.iter_mut() {
            *byte ^= self.0;
        }
        Ok(data.len())
    }
}

/// Wraps a factory and counts constructions.
///
/// `with_delay` stretches construction so concurrent first decrypts overlap.
#[derive(Clone)]
pub struct CountingEngineFactory {
    inner: Arc<dyn EngineFactory>,
    created: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingEngineFactory {
    pub fn new(inner: Arc<dyn EngineFactory>) -> Self {
        Self {
            inner,
            created: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Factory building [`XorEngine`]s for any key system.
    pub fn xor(mask: u8) -> Self {
        Self::new(Arc::new(XorFactory(mask)))
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of construction attempts so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for CountingEngineFactory {
    fn create(
        &self,
        key_system: &str,
        session_id: &SessionId,
    ) -> DrmResult<Box<dyn DecryptionEngine>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.inner.create(key_system, session_id)
    }
}

struct XorFactory(u8);

impl EngineFactory for XorFactory {
    fn create(
        &self,
        _key_system: &str,
        _session_id: &SessionId,
    ) -> DrmResult<Box<dyn DecryptionEngine>> {
        Ok(Box::new(XorEngine(self.0)))
    }
}
