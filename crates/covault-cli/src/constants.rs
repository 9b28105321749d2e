//! CLI-wide constants.

/// Process exit codes.
///
/// 0 is success and 1 is the catch-all for unhandled errors, so the
/// distinguishable failures start at 3 (2 belongs to the shell).
/// Scripts branch on these.
pub mod exit_codes {
    /// Vault, account, user or history entry does not exist.
    pub const NOT_FOUND: i32 = 3;

    /// Arguments or input that fail validation.
    pub const INVALID_INPUT: i32 = 4;

    /// Wrong passphrase or unknown login.
    pub const AUTH_FAILED: i32 = 5;

    /// Authenticated, but this caller may not touch the record.
    pub const ACCESS_DENIED: i32 = 6;
}
