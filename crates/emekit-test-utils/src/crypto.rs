//! AES-128-CBC helpers for producing clear-key test content.

use aes::Aes128;
use cbc::{
    Encryptor,
    cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding},
};
use emekit_drm::{AES_BLOCK_SIZE, ContentKey};

pub fn test_key() -> ContentKey {
    *b"0123456789abcdef"
}

pub fn test_iv() -> [u8; AES_BLOCK_SIZE] {
    [0x42; AES_BLOCK_SIZE]
}

/// Encrypt the block-aligned prefix of `plain`; a trailing partial block
/// stays in the clear.
pub fn encrypt_cbc(key: &ContentKey, iv: &[u8; AES_BLOCK_SIZE], plain: &[u8]) -> Vec<u8> {
    let mut out = plain.to_vec();
    let aligned = out.len() - out.len() % AES_BLOCK_SIZE;
    if aligned > 0 {
        Encryptor::<Aes128>::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut out[..aligned], aligned)
            .unwrap();
    }
    out
}
