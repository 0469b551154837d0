#![forbid(unsafe_code)]

//! AES-128-CBC clear-key engine.

use std::fmt;

use aes::Aes128;
use cbc::{
    Decryptor,
    cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding},
};
use tracing::trace;

use crate::{DecryptionEngine, DrmError, DrmResult};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128-CBC decryption engine.
///
/// Each `decrypt` call starts a fresh CBC chain from the supplied IV. Only
/// the block-aligned prefix of the buffer is decrypted; a trailing partial
/// block is left in the clear, as CENC `cbc1` sample encryption expects.
#[derive(Clone)]
pub struct Aes128CbcEngine {
    key: [u8; AES_BLOCK_SIZE],
}

impl Aes128CbcEngine {
    pub fn new(key: [u8; AES_BLOCK_SIZE]) -> Self {
        Self { key }
    }

    /// Build an engine from an untyped key buffer.
    pub fn from_slice(key: &[u8]) -> DrmResult<Self> {
        let key: [u8; AES_BLOCK_SIZE] = key
            .try_into()
            .map_err(|_| DrmError::InvalidKeyLength(key.len()))?;
        Ok(Self::new(key))
    }
}

impl fmt::Debug for Aes128CbcEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aes128CbcEngine").finish_non_exhaustive()
    }
}

impl DecryptionEngine for Aes128CbcEngine {
    fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> DrmResult<usize> {
        let iv: [u8; AES_BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| DrmError::InvalidIvLength(iv.len()))?;

        let aligned = data.len() - data.len() % AES_BLOCK_SIZE;
        if aligned == 0 {
            return Ok(0);
        }

        let decryptor = Decryptor::<Aes128>::new((&self.key).into(), (&iv).into());
        let written = decryptor
            .decrypt_padded_mut::<NoPadding>(&mut data[..aligned])
            .map_err(|e| DrmError::DecryptFailed(e.to_string()))?
            .len();

        trace!(
            len = data.len(),
            decrypted = written,
            clear_tail = data.len() - written,
            "aes128_cbc: sample decrypted in place"
        );
        Ok(written)
    }
}
