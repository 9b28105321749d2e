//! On-disk CLI configuration: `config.toml` in the XDG config dir.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CovaultConfig {
    pub vault: VaultSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub ui: UiSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VaultSection {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SessionSection {
    /// Login used when neither --user nor COVAULT_USER is given.
    pub default_user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UiSection {
    pub timezone: Option<String>,
}

impl CovaultConfig {
    pub fn new(vault_path: PathBuf, default_user: Option<String>) -> Self {
        Self {
            vault: VaultSection {
                path: vault_path.to_string_lossy().to_string(),
            },
            session: SessionSection { default_user },
            ui: UiSection::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_vault_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("vault.db"))
}

pub fn read_config(path: &Path) -> anyhow::Result<CovaultConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &CovaultConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

/// The `covault` subdirectory of an XDG base dir, honoring the env
/// override when it is set and non-empty.
fn xdg_dir(env_key: &str, fallback: &[&str]) -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("covault"));
        }
    }
    let mut dir = home_dir()?;
    for part in fallback {
        dir.push(part);
    }
    dir.push("covault");
    Ok(dir)
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [vault]
            path = "/tmp/vault.db"

            [session]
            default_user = "admin"

            [ui]
            timezone = "UTC"
        "#;
        let config: CovaultConfig = toml::from_str(toml).expect("parse config");
        assert_eq!(config.vault.path, "/tmp/vault.db");
        assert_eq!(config.session.default_user.as_deref(), Some("admin"));
        assert_eq!(config.ui.timezone.as_deref(), Some("UTC"));
    }

    #[test]
    fn test_parse_config_minimal() {
        let toml = r#"
            [vault]
            path = "/tmp/vault.db"
        "#;
        let config: CovaultConfig = toml::from_str(toml).expect("parse config");
        assert!(config.session.default_user.is_none());
        assert!(config.ui.timezone.is_none());
    }

    #[test]
    fn test_xdg_paths_use_env() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/covault-config-test");
        std::env::set_var("XDG_DATA_HOME", "/tmp/covault-data-test");

        let config_dir = xdg_config_dir().expect("config dir");
        let data_dir = xdg_data_dir().expect("data dir");

        assert_eq!(
            config_dir,
            PathBuf::from("/tmp/covault-config-test").join("covault")
        );
        assert_eq!(
            data_dir,
            PathBuf::from("/tmp/covault-data-test").join("covault")
        );
    }

    #[test]
    fn test_write_and_read_config_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Nested path exercises the create_dir_all branch.
        let path = dir.path().join("nested").join("config.toml");

        let config = CovaultConfig::new(
            PathBuf::from("/data/team/vault.db"),
            Some("alice".to_string()),
        );
        write_config(&path, &config).expect("write config");

        let loaded = read_config(&path).expect("read config");
        assert_eq!(loaded.vault.path, "/data/team/vault.db");
        assert_eq!(loaded.session.default_user.as_deref(), Some("alice"));
        assert!(loaded.ui.timezone.is_none());
    }
}
