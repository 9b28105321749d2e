//! Passphrase key derivation.
//!
//! The master passphrase never encrypts anything directly. It is stretched
//! with Argon2id into an [`UnlockKey`] (the key-encryption key) using the
//! vault-wide KDF salt recorded in the master key state. Deriving once per
//! session keeps repeated account reads from paying the Argon2 cost.

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::ZeroizeOnDrop;

use crate::error::{Result, VaultError};

use super::keys::KEY_LENGTH;

/// Length of the vault-wide KDF salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Argon2id memory cost in KiB (64 MiB).
const ARGON2_MEMORY_KB: u32 = 65536;

/// Argon2id iteration count.
const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism factor.
const ARGON2_PARALLELISM: u32 = 1;

/// Session-scoped key-encryption key derived from the master passphrase.
///
/// Carries the master key state version and fingerprint it was derived
/// against so callers can detect rows wrapped under an older state without
/// touching the passphrase again. Key bytes are zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct UnlockKey {
    key: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    version: u32,
    #[zeroize(skip)]
    key_hash: String,
    #[zeroize(skip)]
    kdf_salt: [u8; SALT_LENGTH],
}

impl UnlockKey {
    pub(crate) fn new(
        key: [u8; KEY_LENGTH],
        version: u32,
        key_hash: String,
        kdf_salt: [u8; SALT_LENGTH],
    ) -> Self {
        Self {
            key,
            version,
            key_hash,
            kdf_salt,
        }
    }

    /// Master key state version this key was derived against.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Fingerprint of the master key state this key was derived against.
    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    /// KDF salt the key was derived with.
    pub(crate) fn kdf_salt(&self) -> &[u8; SALT_LENGTH] {
        &self.kdf_salt
    }

    /// Raw key bytes. Use only for immediate cipher operations.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for UnlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockKey")
            .field("key", &"[REDACTED]")
            .field("version", &self.version)
            .field("key_hash", &self.key_hash)
            .finish()
    }
}

/// Derive raw key-encryption-key bytes from a passphrase and salt.
///
/// Uses Argon2id with parameters sized for interactive unlock. The same
/// passphrase and salt always produce the same bytes, which is what lets a
/// wrapped content key written in one session be unwrapped in another.
pub(crate) fn derive_kek(
    passphrase: &SecretString,
    salt: &[u8; SALT_LENGTH],
) -> Result<[u8; KEY_LENGTH]> {
    let params = Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| VaultError::CryptoFailure(format!("invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| VaultError::CryptoFailure(format!("key derivation failed: {}", e)))?;

    Ok(key)
}
