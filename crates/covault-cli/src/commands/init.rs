use std::path::PathBuf;

use covault_core::{SqliteVaultStore, Vault};

use crate::app::resolve_vault_path;
use crate::cli::{Cli, InitArgs};
use crate::config::{default_config_path, write_config, CovaultConfig};
use crate::helpers::prompt_init_passphrase;
use crate::ui::{hint, receipt, UiContext};

pub fn handle_init(cli: &Cli, args: &InitArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);

    let path = match &args.path {
        Some(value) => PathBuf::from(value),
        None => resolve_vault_path(cli)?,
    };
    if path.exists() {
        return Err(anyhow::anyhow!(
            "A vault already exists at {}.\nHint: Pass a different path, or remove the old vault first.",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create {}: {}", parent.display(), e)
            })?;
        }
    }

    let passphrase = prompt_init_passphrase("Enter master passphrase")?;
    Vault::<SqliteVaultStore>::initialize(&path, &passphrase, &args.admin)?;

    if !args.no_config {
        let config_path = match &args.config_path {
            Some(value) => PathBuf::from(value),
            None => default_config_path()?,
        };
        let default_user = args
            .default_user
            .clone()
            .or_else(|| Some(args.admin.clone()));
        let config = CovaultConfig::new(path.clone(), default_user);
        write_config(&config_path, &config)?;
    }

    if !cli.quiet {
        let path_display = path.display().to_string();
        println!(
            "{}",
            receipt(
                &ctx,
                "Vault created",
                &[("Path", path_display.as_str()), ("Admin", args.admin.as_str())],
            )
        );
        println!("{}", hint(&ctx, "Run `covault add <NAME>` to store a first account."));
    }
    Ok(())
}
