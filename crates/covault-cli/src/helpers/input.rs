//! Input handling helpers for passphrases and account secrets.

use std::io::{self, BufRead, IsTerminal};

use dialoguer::{Confirm, Password};
use secrecy::SecretString;
use zeroize::Zeroize;

/// Minimum length accepted for a new master passphrase.
const MIN_PASSPHRASE_LEN: usize = 8;

/// Prompt for the master passphrase, or read from COVAULT_PASSPHRASE env var.
pub fn prompt_passphrase(interactive: bool) -> anyhow::Result<SecretString> {
    if let Ok(value) = std::env::var("COVAULT_PASSPHRASE") {
        if !value.trim().is_empty() {
            return Ok(SecretString::from(value));
        }
    }
    if !interactive {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set COVAULT_PASSPHRASE."
        ));
    }
    let value = Password::new()
        .with_prompt("Master passphrase")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))?;
    Ok(SecretString::from(value))
}

/// Prompt for a new master passphrase with confirmation (init and rotation),
/// or read from COVAULT_PASSPHRASE env var.
pub fn prompt_init_passphrase(prompt: &str) -> anyhow::Result<SecretString> {
    if let Ok(value) = std::env::var("COVAULT_PASSPHRASE") {
        if !value.trim().is_empty() {
            validate_passphrase(&value)
                .map_err(|e| anyhow::anyhow!("Passphrase does not meet requirements: {}", e))?;
            return Ok(SecretString::from(value));
        }
    }
    loop {
        let passphrase = Password::new()
            .with_prompt(prompt)
            .with_confirmation("Confirm passphrase", "Passphrases do not match")
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))?;
        if let Err(err) = validate_passphrase(&passphrase) {
            eprintln!("Passphrase does not meet requirements: {}", err);
            continue;
        }
        return Ok(SecretString::from(passphrase));
    }
}

/// Prompt for the replacement passphrase during rotation.
///
/// Reads COVAULT_NEW_PASSPHRASE, not COVAULT_PASSPHRASE; the latter still
/// holds the passphrase being rotated away.
pub fn prompt_rotation_passphrase() -> anyhow::Result<SecretString> {
    if let Ok(value) = std::env::var("COVAULT_NEW_PASSPHRASE") {
        if !value.trim().is_empty() {
            validate_passphrase(&value)
                .map_err(|e| anyhow::anyhow!("Passphrase does not meet requirements: {}", e))?;
            return Ok(SecretString::from(value));
        }
    }
    loop {
        let passphrase = Password::new()
            .with_prompt("New master passphrase")
            .with_confirmation("Confirm new passphrase", "Passphrases do not match")
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))?;
        if let Err(err) = validate_passphrase(&passphrase) {
            eprintln!("Passphrase does not meet requirements: {}", err);
            continue;
        }
        return Ok(SecretString::from(passphrase));
    }
}

/// Check a candidate master passphrase against the local policy.
pub fn validate_passphrase(candidate: &str) -> Result<(), String> {
    if candidate.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(format!("at least {} characters", MIN_PASSPHRASE_LEN));
    }
    Ok(())
}

/// Read an account secret: prompt on a TTY, else take the first stdin line.
///
/// The non-TTY path exists for scripting (`echo "s3cret" | covault add ...`).
pub fn read_secret(prompt: &str) -> anyhow::Result<SecretString> {
    if io::stdin().is_terminal() {
        let value = Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read secret: {}", e))?;
        if value.is_empty() {
            return Err(anyhow::anyhow!("Secret must not be empty"));
        }
        return Ok(SecretString::from(value));
    }

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
    let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
    line.zeroize();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("No secret provided on stdin"));
    }
    Ok(SecretString::from(trimmed))
}

/// Ask for confirmation before a destructive action.
///
/// `assume_yes` short-circuits for `--yes`; a non-TTY without `--yes` refuses
/// rather than guessing.
pub fn confirm_destructive(prompt: &str, assume_yes: bool) -> anyhow::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "Refusing to {} without confirmation. Pass --yes to proceed.",
            prompt
        ));
    }
    Confirm::new()
        .with_prompt(format!("Really {}?", prompt))
        .default(false)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read confirmation: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_passphrase_rejects_short() {
        assert!(validate_passphrase("short").is_err());
    }

    #[test]
    fn test_validate_passphrase_accepts_long() {
        assert!(validate_passphrase("correct horse battery staple").is_ok());
    }

    #[test]
    fn test_confirm_destructive_assume_yes() {
        assert!(confirm_destructive("delete it", true).expect("confirm"));
    }
}
