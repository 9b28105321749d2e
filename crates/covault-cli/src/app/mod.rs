//! Application context: vault resolution and session opening with retry.

use std::io::IsTerminal;
use std::path::PathBuf;

use secrecy::SecretString;

use covault_core::error::VaultError;
use covault_core::{SqliteVaultStore, Session, Vault};

use crate::cli::Cli;
use crate::config::{default_config_path, default_vault_path, read_config};
use crate::errors::CliError;
use crate::helpers::prompt_passphrase;

/// An opened vault plus the authenticated session driving it.
pub struct VaultSession {
    pub vault: Vault<SqliteVaultStore>,
    pub session: Session,
}

/// Resolve the vault path: `--vault` flag, then config, then XDG default.
pub fn resolve_vault_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.vault {
        return Ok(PathBuf::from(path));
    }
    if let Ok(config_path) = default_config_path() {
        if config_path.exists() {
            let config = read_config(&config_path)?;
            return Ok(PathBuf::from(config.vault.path));
        }
    }
    default_vault_path()
}

/// Resolve the login identity: `--user` flag, then config, then "admin".
pub fn resolve_login(cli: &Cli) -> anyhow::Result<String> {
    if let Some(login) = &cli.user {
        return Ok(login.clone());
    }
    if let Ok(config_path) = default_config_path() {
        if config_path.exists() {
            let config = read_config(&config_path)?;
            if let Some(login) = config.session.default_user {
                return Ok(login);
            }
        }
    }
    Ok("admin".to_string())
}

/// Message shown when the vault file does not exist yet.
fn missing_vault_message(path: &std::path::Path) -> String {
    format!(
        "Vault not found at {}.\nHint: Run `covault init` to create it, or pass --vault <PATH>.",
        path.display()
    )
}

/// Open the vault and authenticate, prompting for the passphrase with retry.
///
/// The passphrase is taken from COVAULT_PASSPHRASE when set; otherwise the
/// user is prompted up to three times on a TTY. Wrong-passphrase exhaustion
/// exits with the auth-failed code rather than returning.
pub fn open_session(cli: &Cli) -> anyhow::Result<VaultSession> {
    let path = resolve_vault_path(cli)?;
    if !path.exists() {
        return Err(anyhow::anyhow!(missing_vault_message(&path)));
    }

    let mut vault = Vault::<SqliteVaultStore>::open(&path)?;
    let login = resolve_login(cli)?;
    let interactive = std::io::stdin().is_terminal();

    // Environment passphrase gets exactly one attempt.
    let env_passphrase = std::env::var("COVAULT_PASSPHRASE")
        .ok()
        .filter(|v| !v.trim().is_empty());
    if let Some(value) = env_passphrase {
        let passphrase = SecretString::from(value);
        return match vault.login(&login, &passphrase) {
            Ok(session) => Ok(VaultSession { vault, session }),
            Err(VaultError::InvalidCredentials) => {
                CliError::auth_failed("Incorrect passphrase.").exit()
            }
            Err(err) => Err(login_error(err, &login)),
        };
    }

    login_with_retry_prompt(vault, &login, interactive, cli.quiet)
}

fn login_with_retry_prompt(
    mut vault: Vault<SqliteVaultStore>,
    login: &str,
    interactive: bool,
    quiet: bool,
) -> anyhow::Result<VaultSession> {
    let test_attempts = if !interactive && cfg!(feature = "test-support") {
        std::env::var("COVAULT_TEST_PASSPHRASE_ATTEMPTS")
            .ok()
            .map(|value| {
                value
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<String>>()
            })
    } else {
        None
    };
    let max_attempts: u32 = if interactive || test_attempts.is_some() {
        3
    } else {
        1
    };
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let passphrase = if let Some(values) = test_attempts.as_ref() {
            let value = values
                .get((attempts - 1) as usize)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No passphrase attempts remaining"))?;
            SecretString::from(value)
        } else {
            prompt_passphrase(interactive)?
        };
        match vault.login(login, &passphrase) {
            Ok(session) => {
                if interactive && !quiet && session.key_version() > 1 {
                    eprintln!("Unlocked (master key version {}).", session.key_version());
                }
                return Ok(VaultSession { vault, session });
            }
            Err(VaultError::InvalidCredentials) => {
                let remaining = max_attempts.saturating_sub(attempts);
                if remaining == 0 {
                    CliError::auth_failed_with_hint(
                        "Too many failed passphrase attempts.",
                        "Hint: If the master passphrase is lost, the vault cannot be recovered.",
                    )
                    .exit()
                }
                eprintln!(
                    "Incorrect passphrase. {} attempt{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
                continue;
            }
            Err(err) => return Err(login_error(err, login)),
        }
    }
}

fn login_error(err: VaultError, login: &str) -> anyhow::Error {
    match err {
        VaultError::AccessDenied => anyhow::anyhow!(
            "User \"{}\" is not allowed to open the vault (disabled account).",
            login
        ),
        other => other.into(),
    }
}

/// Convert a core error into the CLI's coded exits where one applies.
///
/// `AccessDenied`, not-found lookups, and invalid input terminate the
/// process with their reserved exit codes; everything else flows back as an
/// `anyhow` error for the generic handler in `main`.
pub fn vault_result<T>(result: Result<T, VaultError>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(VaultError::AccessDenied) => CliError::access_denied("Access denied.").exit(),
        Err(VaultError::InvalidCredentials) => {
            CliError::auth_failed("Invalid credentials.").exit()
        }
        Err(VaultError::UnknownUser(login)) => CliError::not_found(
            format!("User \"{}\" not found", login),
            "Hint: Run `covault user list` to see users.",
        )
        .exit(),
        Err(VaultError::UnknownHistoryEntry(id)) => CliError::not_found(
            format!("History entry {} not found", id),
            "Hint: Run `covault history list <ACCOUNT>` to see snapshots.",
        )
        .exit(),
        Err(VaultError::InvalidInput(message)) => CliError::InvalidInput(message).exit(),
        Err(VaultError::NeedsKeyMigration) => Err(anyhow::anyhow!(
            "Encrypted under a superseded master key.\nHint: Rewrite the secret with `covault edit-pass` to bring a live account forward; superseded snapshots stay sealed."
        )),
        Err(other) => Err(other.into()),
    }
}
