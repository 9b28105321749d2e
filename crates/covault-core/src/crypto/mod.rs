//! Key hierarchy and content encryption.
//!
//! One scheme end to end:
//!
//! 1. The master passphrase is checked against an Argon2id verifier, then
//!    stretched (Argon2id, vault-wide salt) into a session [`UnlockKey`].
//!    The passphrase itself never encrypts data.
//! 2. Each account owns a random 256-bit [`ContentKey`]. It is persisted
//!    only wrapped under the unlock key ([`envelope`], AES-256-GCM).
//! 3. The account secret is sealed under the content key ([`cipher`],
//!    AES-256-GCM, account id as associated data).
//!
//! Rotation re-wraps content keys under the new unlock key; sealed secrets
//! are untouched, so their ciphertext survives a rotation byte for byte.

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod state;

pub use envelope::SecuredKey;
pub use kdf::UnlockKey;
pub use keys::ContentKey;
pub use state::MasterKeyState;
