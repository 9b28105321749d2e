//! Master key state.
//!
//! A single vault-wide record that anchors the key hierarchy: the KDF salt
//! every session derives its unlock key from, an Argon2id verifier for
//! checking the passphrase without decrypting anything, and a version that
//! increments on every rotation. Its fingerprint is stamped onto account
//! and history rows so stale material is detectable offline.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};

use super::kdf::{derive_kek, UnlockKey, SALT_LENGTH};

/// The vault's current master key parameters.
#[derive(Debug, Clone)]
pub struct MasterKeyState {
    /// Monotonic rotation counter, starts at 1.
    pub version: u32,
    /// Vault-wide Argon2id salt for unlock key derivation.
    pub kdf_salt: [u8; SALT_LENGTH],
    /// Argon2id PHC string for verifying the passphrase.
    pub verifier: String,
    /// When this state was established.
    pub updated_at: DateTime<Utc>,
}

impl MasterKeyState {
    /// Establish the first master key state for a new vault.
    pub fn initial(passphrase: &SecretString) -> Result<Self> {
        Self::build(1, passphrase)
    }

    /// Produce the successor state for a rotation to a new passphrase.
    ///
    /// The version increments and the KDF salt is regenerated, so unlock
    /// keys and envelopes from the previous state no longer match.
    pub fn next(&self, new_passphrase: &SecretString) -> Result<Self> {
        Self::build(self.version + 1, new_passphrase)
    }

    fn build(version: u32, passphrase: &SecretString) -> Result<Self> {
        let mut kdf_salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut kdf_salt);

        let verifier_salt = SaltString::generate(&mut OsRng);
        let verifier = Argon2::default()
            .hash_password(passphrase.expose_secret().as_bytes(), &verifier_salt)
            .map_err(|e| VaultError::CryptoFailure(format!("verifier hashing failed: {}", e)))?
            .to_string();

        Ok(Self {
            version,
            kdf_salt,
            verifier,
            updated_at: Utc::now(),
        })
    }

    /// Check a passphrase against the stored verifier.
    ///
    /// Any verification failure collapses to
    /// [`VaultError::InvalidCredentials`].
    pub fn verify(&self, passphrase: &SecretString) -> Result<()> {
        let parsed = PasswordHash::new(&self.verifier)
            .map_err(|e| VaultError::CryptoFailure(format!("stored verifier unreadable: {}", e)))?;
        Argon2::default()
            .verify_password(passphrase.expose_secret().as_bytes(), &parsed)
            .map_err(|_| VaultError::InvalidCredentials)
    }

    /// Verify the passphrase and derive the session unlock key.
    pub fn unlock(&self, passphrase: &SecretString) -> Result<UnlockKey> {
        self.verify(passphrase)?;
        let key = derive_kek(passphrase, &self.kdf_salt)?;
        tracing::debug!(version = self.version, "master key unlocked");
        Ok(UnlockKey::new(
            key,
            self.version,
            self.key_hash(),
            self.kdf_salt,
        ))
    }

    /// Fingerprint of this state, stamped onto rows encrypted under it.
    ///
    /// Covers version, salt and verifier; any rotation changes it.
    pub fn key_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_be_bytes());
        hasher.update(self.kdf_salt);
        hasher.update(self.verifier.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_verify_accepts_correct_passphrase() {
        let state = MasterKeyState::initial(&passphrase("opensesame")).unwrap();
        assert!(state.verify(&passphrase("opensesame")).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_passphrase() {
        let state = MasterKeyState::initial(&passphrase("opensesame")).unwrap();
        let err = state.verify(&passphrase("closebarley")).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_unlock_carries_state_identity() {
        let state = MasterKeyState::initial(&passphrase("opensesame")).unwrap();
        let unlock = state.unlock(&passphrase("opensesame")).unwrap();
        assert_eq!(unlock.version(), 1);
        assert_eq!(unlock.key_hash(), state.key_hash());
    }

    #[test]
    fn test_next_changes_version_salt_and_hash() {
        let state = MasterKeyState::initial(&passphrase("opensesame")).unwrap();
        let rotated = state.next(&passphrase("newphrase")).unwrap();
        assert_eq!(rotated.version, 2);
        assert_ne!(rotated.kdf_salt, state.kdf_salt);
        assert_ne!(rotated.key_hash(), state.key_hash());
        assert!(rotated.verify(&passphrase("newphrase")).is_ok());
        assert!(matches!(
            rotated.verify(&passphrase("opensesame")).unwrap_err(),
            VaultError::InvalidCredentials
        ));
    }

    #[test]
    fn test_key_hash_is_stable() {
        let state = MasterKeyState::initial(&passphrase("opensesame")).unwrap();
        assert_eq!(state.key_hash(), state.key_hash());
    }
}
