//! Error types for Covault core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps them to
//! user-friendly messages. Cryptographic and authorization failures are
//! deliberately terse: they carry no detail that could distinguish a
//! missing account from a forbidden one, or a wrong passphrase from a
//! tampered ciphertext.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for Covault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for Covault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong master passphrase, or an unwrap/decrypt whose authentication
    /// tag did not verify. Cryptographically the two are indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The row was encrypted under a superseded master-key state and must be
    /// migrated before it can be decrypted.
    #[error("Encrypted under a superseded master key; migration required")]
    NeedsKeyMigration,

    /// Corrupted or malformed ciphertext, or a cipher-level failure that is
    /// not attributable to credentials.
    #[error("Cryptographic failure: {0}")]
    CryptoFailure(String),

    /// The caller is not authorized for the requested account or operation.
    /// Also returned for accounts that do not exist, so that callers cannot
    /// probe for existence.
    #[error("Access denied")]
    AccessDenied,

    /// A persistence-level guard failed: unique violation, foreign key,
    /// or an optimistic-concurrency mismatch on `date_edit`.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A search filter could not be turned into an executable query.
    #[error("Query error: {0}")]
    QueryError(String),

    /// User not found by login (administrative surface only; account
    /// lookups mask not-found as `AccessDenied`).
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// History entry not found or not owned by the given account.
    #[error("Unknown history entry: {0}")]
    UnknownHistoryEntry(Uuid),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl VaultError {
    /// Whether this error is safe to show verbatim to an end user.
    ///
    /// Persistence internals are not; the CLI substitutes an opaque message
    /// and leaves the detail to the tracing output.
    pub fn is_user_safe(&self) -> bool {
        !matches!(
            self,
            VaultError::Sqlite { .. } | VaultError::Io { .. } | VaultError::Json { .. }
        )
    }
}
