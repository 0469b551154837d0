#![forbid(unsafe_code)]

//! Decryption engines for emekit key sessions.
//!
//! A [`DecryptionEngine`] holds the content key negotiated for one session and
//! transforms sample buffers in place. Engines are built by an
//! [`EngineFactory`]; [`EngineRegistry`] dispatches on the key-system id.
//!
//! # Clear Key
//!
//! [`Aes128CbcEngine`] decrypts with a key taken from a shared [`KeyStore`].
//! `EngineRegistry::with_clear_key(store)` registers it under
//! [`CLEAR_KEY`](emekit_core::CLEAR_KEY).

mod aes_cbc;
mod engine;
mod error;
mod factory;
mod keys;

pub use aes_cbc::{AES_BLOCK_SIZE, Aes128CbcEngine};
pub use engine::DecryptionEngine;
pub use error::{DrmError, DrmResult};
pub use factory::{EngineConstructor, EngineFactory, EngineRegistry};
pub use keys::{ContentKey, KeyStore};
