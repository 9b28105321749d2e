//! Wrapped content key envelopes.
//!
//! A content key at rest is an AES-256-GCM ciphertext under the unlock key,
//! framed so the blob is self-describing:
//!
//! ```text
//! "SVK1" | kdf_salt (16 bytes) | nonce (12 bytes) | ciphertext + tag (48 bytes)
//! ```
//!
//! The embedded salt lets unwrap detect an envelope written under a master
//! key state other than the one the session unlocked, before any AEAD work.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::SecretString;

use crate::error::{Result, VaultError};

use super::kdf::{derive_kek, UnlockKey, SALT_LENGTH};
use super::keys::{ContentKey, KEY_LENGTH};

/// Envelope format tag for wrapped content keys.
const ENVELOPE_MAGIC: &[u8; 4] = b"SVK1";

/// AES-GCM nonce length in bytes.
pub(crate) const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub(crate) const TAG_LENGTH: usize = 16;

/// Total length of a well-formed envelope.
const ENVELOPE_LENGTH: usize = 4 + SALT_LENGTH + NONCE_LENGTH + KEY_LENGTH + TAG_LENGTH;

/// A content key wrapped under an unlock key, safe to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredKey(Vec<u8>);

impl SecuredKey {
    /// Accept persisted bytes as an envelope, validating the frame.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != ENVELOPE_LENGTH || &bytes[..4] != ENVELOPE_MAGIC {
            return Err(VaultError::CryptoFailure(
                "malformed content key envelope".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Envelope bytes for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// KDF salt recorded when this envelope was written.
    fn kdf_salt(&self) -> &[u8] {
        &self.0[4..4 + SALT_LENGTH]
    }

    fn nonce(&self) -> &[u8] {
        &self.0[4 + SALT_LENGTH..4 + SALT_LENGTH + NONCE_LENGTH]
    }

    fn ciphertext(&self) -> &[u8] {
        &self.0[4 + SALT_LENGTH + NONCE_LENGTH..]
    }
}

/// Wrap a content key under the session unlock key.
pub fn wrap(content_key: &ContentKey, unlock: &UnlockKey) -> Result<SecuredKey> {
    let cipher = Aes256Gcm::new_from_slice(unlock.as_bytes())
        .map_err(|e| VaultError::CryptoFailure(format!("cipher init failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, content_key.as_bytes().as_slice())
        .map_err(|_| VaultError::CryptoFailure("content key wrap failed".to_string()))?;

    let mut out = Vec::with_capacity(ENVELOPE_LENGTH);
    out.extend_from_slice(ENVELOPE_MAGIC);
    out.extend_from_slice(unlock.kdf_salt());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    SecuredKey::from_bytes(out)
}

/// Unwrap a persisted envelope with the session unlock key.
///
/// Returns [`VaultError::NeedsKeyMigration`] when the envelope was written
/// under a different KDF salt than the session's, and
/// [`VaultError::InvalidCredentials`] when authentication fails.
pub fn unwrap(secured: &SecuredKey, unlock: &UnlockKey) -> Result<ContentKey> {
    if secured.kdf_salt() != unlock.kdf_salt() {
        return Err(VaultError::NeedsKeyMigration);
    }
    open(secured, unlock.as_bytes())
}

/// Unwrap an envelope from the passphrase alone.
///
/// Re-derives the key-encryption key from the envelope's embedded salt, so
/// it works without the master key state row or an open session. This is
/// the recovery path; regular reads go through [`unwrap`] and the session
/// unlock key.
pub fn unwrap_with_passphrase(
    secured: &SecuredKey,
    passphrase: &SecretString,
) -> Result<ContentKey> {
    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(secured.kdf_salt());
    let kek = derive_kek(passphrase, &salt)?;
    open(secured, &kek)
}

fn open(secured: &SecuredKey, kek: &[u8; KEY_LENGTH]) -> Result<ContentKey> {
    let cipher = Aes256Gcm::new_from_slice(kek)
        .map_err(|e| VaultError::CryptoFailure(format!("cipher init failed: {}", e)))?;

    let nonce = Nonce::from_slice(secured.nonce());
    let plaintext = cipher
        .decrypt(nonce, secured.ciphertext())
        .map_err(|_| VaultError::InvalidCredentials)?;

    let mut key = [0u8; KEY_LENGTH];
    if plaintext.len() != KEY_LENGTH {
        return Err(VaultError::CryptoFailure(
            "unwrapped key has unexpected length".to_string(),
        ));
    }
    key.copy_from_slice(&plaintext);
    Ok(ContentKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::UnlockKey;

    fn unlock_key(byte: u8, salt: u8) -> UnlockKey {
        UnlockKey::new(
            [byte; KEY_LENGTH],
            1,
            "hash".into(),
            [salt; SALT_LENGTH],
        )
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let unlock = unlock_key(5, 1);
        let content = ContentKey::generate();
        let secured = wrap(&content, &unlock).unwrap();
        let recovered = unwrap(&secured, &unlock).unwrap();
        assert_eq!(content.as_bytes(), recovered.as_bytes());
    }

    #[test]
    fn test_unwrap_wrong_key_fails_closed() {
        let content = ContentKey::generate();
        let secured = wrap(&content, &unlock_key(5, 1)).unwrap();
        let err = unwrap(&secured, &unlock_key(6, 1)).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_unwrap_salt_mismatch_flags_migration() {
        let content = ContentKey::generate();
        let secured = wrap(&content, &unlock_key(5, 1)).unwrap();
        let err = unwrap(&secured, &unlock_key(5, 2)).unwrap_err();
        assert!(matches!(err, VaultError::NeedsKeyMigration));
    }

    #[test]
    fn test_unwrap_with_passphrase_needs_no_session() {
        let pw = SecretString::from("correct horse".to_string());
        let salt = [3u8; SALT_LENGTH];
        let kek = derive_kek(&pw, &salt).unwrap();
        let unlock = UnlockKey::new(kek, 1, "hash".into(), salt);

        let content = ContentKey::generate();
        let secured = wrap(&content, &unlock).unwrap();

        let recovered = unwrap_with_passphrase(&secured, &pw).unwrap();
        assert_eq!(recovered.as_bytes(), content.as_bytes());

        let wrong = SecretString::from("battery staple".to_string());
        let err = unwrap_with_passphrase(&secured, &wrong).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_tampered_envelope_rejected() {
        let unlock = unlock_key(5, 1);
        let content = ContentKey::generate();
        let mut bytes = wrap(&content, &unlock).unwrap().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let secured = SecuredKey::from_bytes(bytes).unwrap();
        let err = unwrap(&secured, &unlock).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        assert!(SecuredKey::from_bytes(vec![1, 2, 3]).is_err());
        let mut bytes = vec![0u8; ENVELOPE_LENGTH];
        bytes[..4].copy_from_slice(b"NOPE");
        assert!(SecuredKey::from_bytes(bytes).is_err());
    }
}
