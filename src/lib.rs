//! Tokenseal - Passphrase-based token encryption using PBKDF2 and AES-256-GCM

#![forbid(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod manifest;
pub mod passphrase;
pub mod token_ops;
pub mod transport;
