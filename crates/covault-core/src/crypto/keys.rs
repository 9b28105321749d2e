//! Symmetric key material types.
//!
//! Key bytes are zeroized from memory on drop and redacted from Debug
//! output, reducing the window of exposure.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

/// Length of symmetric keys in bytes (32 bytes = 256 bits, AES-256-GCM).
pub const KEY_LENGTH: usize = 32;

/// A per-account symmetric content key.
///
/// Each account's secret is encrypted under its own content key; the key
/// itself is persisted only in wrapped form (see [`crate::crypto::envelope`]).
#[derive(Clone, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_LENGTH],
}

impl ContentKey {
    /// Generate a fresh content key from the OS entropy source.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Reconstruct a content key from raw bytes (unwrap path).
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Raw key bytes. Use only for immediate cipher operations.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
