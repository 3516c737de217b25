//! Passphrase key derivation using PBKDF2-HMAC-SHA256
//!
//! The parameters are fixed. Changing any of them makes every previously
//! produced envelope undecryptable.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 32;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 25_000;

/// A 256-bit key derived from a passphrase. Wiped from memory on drop.
pub struct DerivedKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive a 32-byte key from a passphrase and salt.
///
/// Identical inputs always produce the identical key.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> DerivedKey {
    tracing::debug!(iterations = PBKDF2_ITERATIONS, "deriving key");
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut key[..]);
    DerivedKey { key }
}
