//! Typed CLI failures and their exit codes.
//!
//! Commands bubble these up through `anyhow`; `main` downcasts and
//! exits with the matching code so scripts can tell the failure modes
//! apart.

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    /// Vault, account, user or history entry does not exist.
    NotFound { message: String, hint: String },

    /// Wrong passphrase, exhausted attempts, or unknown login.
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Arguments or input that fail validation.
    InvalidInput(String),

    /// Authenticated, but this caller may not touch the record.
    AccessDenied(String),
}

impl CliError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        CliError::AccessDenied(message.into())
    }

    /// Message plus the hint line, when the variant carries one.
    fn parts(&self) -> (&str, Option<&str>) {
        match self {
            CliError::NotFound { message, hint } => (message, Some(hint)),
            CliError::AuthFailed { message, hint } => (message, hint.as_deref()),
            CliError::InvalidInput(message) => (message, None),
            CliError::AccessDenied(message) => (message, None),
        }
    }

    pub fn exit_code(&self) -> i32 {
        use super::constants::exit_codes;
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::AccessDenied(_) => exit_codes::ACCESS_DENIED,
        }
    }

    /// Print to stderr and terminate the process.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts() {
            (message, Some(hint)) => write!(f, "{}\n{}", message, hint),
            (message, None) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::exit_codes;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            CliError::not_found("x", "y").exit_code(),
            CliError::InvalidInput("x".into()).exit_code(),
            CliError::auth_failed("x").exit_code(),
            CliError::access_denied("x").exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_access_denied_maps_to_code_six() {
        assert_eq!(
            CliError::access_denied("Access denied").exit_code(),
            exit_codes::ACCESS_DENIED
        );
    }

    #[test]
    fn test_not_found_display_includes_hint() {
        let err = CliError::not_found("Account not found", "Hint: run `covault list`.");
        let text = format!("{}", err);
        assert!(text.contains("Account not found"));
        assert!(text.contains("Hint: run `covault list`."));
    }

    #[test]
    fn test_auth_failed_without_hint_is_single_line() {
        assert_eq!(
            format!("{}", CliError::auth_failed("Incorrect passphrase.")),
            "Incorrect passphrase."
        );
    }
}
