//! # Covault Core
//!
//! Core library for Covault - a shared-credential vault for teams, with a
//! passphrase-rooted key hierarchy, per-account access control and full
//! change history.
//!
//! Everything here is usable without the CLI: domain logic,
//! cryptography and storage live in this crate.
//!
//! ## Layout
//!
//! - **crypto**: Master key state, key derivation, envelopes and sealing
//! - **acl**: Per-(user, account) access control and permission presets
//! - **search**: Authorization-scoped account queries and filters
//! - **history**: Pre-mutation snapshots and restore
//! - **storage**: Storage trait and the SQLite backend
//! - **vault**: High-level operations tying the above together
//!
//! Plaintext secrets exist only inside a [`vault::Vault`] call; everything
//! at rest is ciphertext under the key hierarchy.

pub mod acl;
pub mod crypto;
pub mod error;
pub mod history;
pub mod search;
pub mod storage;
pub mod vault;

pub use error::{Result, VaultError};
pub use storage::{SqliteVaultStore, VaultStore};
pub use vault::{RotationReport, Session, Vault};

/// Version of the core crate, for `--version` style reporting.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
