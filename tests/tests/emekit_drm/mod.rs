//! Clear-key decryption through a negotiated key session.
