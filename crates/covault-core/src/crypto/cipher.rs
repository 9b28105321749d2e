//! Account secret encryption.
//!
//! Secrets are sealed with AES-256-GCM under the account's content key,
//! never under the passphrase-derived key directly. The account id rides
//! along as associated data, so a ciphertext pasted onto another account
//! row fails authentication instead of decrypting.
//!
//! ```text
//! "SVC1" | nonce (12 bytes) | ciphertext + tag
//! ```

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::error::{Result, VaultError};

use super::envelope::{NONCE_LENGTH, TAG_LENGTH};
use super::keys::ContentKey;

/// Format tag for sealed account secrets.
const SECRET_MAGIC: &[u8; 4] = b"SVC1";

/// Minimum length of a well-formed sealed secret (empty plaintext).
const MIN_SECRET_LENGTH: usize = 4 + NONCE_LENGTH + TAG_LENGTH;

/// Seal an account secret under its content key.
pub fn encrypt_secret(plaintext: &[u8], key: &ContentKey, account_id: Uuid) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::CryptoFailure(format!("cipher init failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = account_id.as_bytes();
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| VaultError::CryptoFailure("secret encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(MIN_SECRET_LENGTH + plaintext.len());
    out.extend_from_slice(SECRET_MAGIC);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed account secret.
///
/// Fails closed: any authentication failure surfaces as
/// [`VaultError::CryptoFailure`] with no partial plaintext.
pub fn decrypt_secret(sealed: &[u8], key: &ContentKey, account_id: Uuid) -> Result<Vec<u8>> {
    if sealed.len() < MIN_SECRET_LENGTH || &sealed[..4] != SECRET_MAGIC {
        return Err(VaultError::CryptoFailure(
            "malformed sealed secret".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::CryptoFailure(format!("cipher init failed: {}", e)))?;

    let nonce = Nonce::from_slice(&sealed[4..4 + NONCE_LENGTH]);
    let aad = account_id.as_bytes();
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed[4 + NONCE_LENGTH..],
                aad,
            },
        )
        .map_err(|_| VaultError::CryptoFailure("secret decryption failed".to_string()))
}
