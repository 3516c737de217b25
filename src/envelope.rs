//! Passphrase envelope encryption using PBKDF2 + AES-256-GCM
//!
//! The binary format is:
//! - salt: 32 bytes
//! - nonce: 12 bytes
//! - ciphertext: variable length (includes 16-byte GCM tag at the end)
//!
//! There is no version byte or length field; the fixed offsets are the only
//! structure.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, TokensealError};
use crate::kdf::{self, SALT_LEN};

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Length of the salt + nonce header
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Message used for every authentication failure. Wrong passphrase and
/// corrupted data must stay indistinguishable.
const AUTH_FAILED_MSG: &str = "corrupt input, tampered-with data, or bad passphrase";

/// Encrypt plaintext with a passphrase using random salt and nonce
///
/// Returns the binary format: salt(32) + nonce(12) + ciphertext(variable)
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(passphrase, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = kdf::derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            TokensealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                "AES-GCM encryption failed",
            )
        })?;

    let mut output = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&ciphertext);

    tracing::debug!(
        plaintext_len = plaintext.len(),
        envelope_len = output.len(),
        "sealed envelope"
    );

    Ok(output)
}

/// Decrypt an envelope with a passphrase
///
/// Input shorter than the salt + nonce header is rejected before any key
/// derivation takes place.
pub fn decrypt(passphrase: &[u8], envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let Some((salt, rest)) = envelope
        .split_first_chunk::<SALT_LEN>()
        .filter(|(_, rest)| rest.len() >= NONCE_LEN)
    else {
        return Err(TokensealError::user(
            ErrorKind::MalformedEnvelope,
            format!(
                "envelope is {} bytes, shorter than the {}-byte salt and nonce header; likely truncated",
                envelope.len(),
                HEADER_LEN
            ),
        ));
    };
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = kdf::derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| TokensealError::user(ErrorKind::AuthenticationFailed, AUTH_FAILED_MSG))?;

    tracing::debug!(
        envelope_len = envelope.len(),
        plaintext_len = plaintext.len(),
        "opened envelope"
    );

    Ok(Zeroizing::new(plaintext))
}
