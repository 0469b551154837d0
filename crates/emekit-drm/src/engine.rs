#![forbid(unsafe_code)]

use crate::DrmResult;

/// Cryptographic transform for one negotiated session.
///
/// Engines are shared between concurrent `decrypt` callers once constructed,
/// so implementations handle their own interior synchronization.
pub trait DecryptionEngine: Send + Sync {
    /// Decrypt `data` in place using `iv`.
    ///
    /// Returns the number of bytes that were transformed; bytes past that
    /// count are left untouched.
    fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> DrmResult<usize>;

    /// Release engine-side buffers (secure memory, output surfaces).
    fn release_mem(&self) -> DrmResult<()> {
        Ok(())
    }
}
