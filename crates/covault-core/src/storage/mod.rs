//! Persistence layer.
//!
//! The [`VaultStore`] trait defines what a backend must provide;
//! [`sqlite::SqliteVaultStore`] is the shipped implementation. Domain
//! types shared by every backend live in [`types`].

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteVaultStore;
pub use traits::VaultStore;
