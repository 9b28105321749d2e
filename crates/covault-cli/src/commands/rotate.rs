use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::{open_session, vault_result};
use crate::cli::{Cli, RotateMasterArgs};
use crate::helpers::{confirm_destructive, prompt_passphrase, prompt_rotation_passphrase};
use crate::output::{print_json, rotation_json};
use crate::ui::{badge, print, receipt, Badge, UiContext};

pub fn handle_rotate_master(cli: &Cli, args: &RotateMasterArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );

    if !confirm_destructive("rotate the master passphrase for every user", args.yes)? {
        print(&ctx, &badge(&ctx, Badge::Info, "Aborted."));
        return Ok(());
    }

    let mut vs = open_session(cli)?;
    let current = prompt_passphrase(ctx.is_interactive())?;
    let new = prompt_rotation_passphrase()?;

    let spinner = if ctx.allows_animation() && !cli.quiet {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Re-wrapping account keys...");
        bar.enable_steady_tick(Duration::from_millis(120));
        Some(bar)
    } else {
        None
    };

    let result = vs
        .vault
        .rotate_master_passphrase(&mut vs.session, &current, &new);

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let report = vault_result(result)?;

    if ctx.mode.is_json() {
        return print_json(&rotation_json(&report));
    }
    if !cli.quiet {
        let version = report.new_version.to_string();
        let accounts = report.accounts_rewrapped.to_string();
        let history = report.history_rewrapped.to_string();
        println!(
            "{}",
            receipt(
                &ctx,
                "Master passphrase rotated",
                &[
                    ("Key Version", version.as_str()),
                    ("Accounts", accounts.as_str()),
                    ("Snapshots", history.as_str()),
                ],
            )
        );
        let skipped = report.skipped_accounts.len() + report.skipped_history.len();
        if skipped > 0 {
            println!(
                "{}",
                badge(
                    &ctx,
                    Badge::Warn,
                    &format!(
                        "{} row{} already carried a stale key and {} left untouched.",
                        skipped,
                        if skipped == 1 { "" } else { "s" },
                        if skipped == 1 { "was" } else { "were" },
                    ),
                )
            );
        }
        println!("Other users must present the new passphrase at their next login.");
    }
    Ok(())
}
