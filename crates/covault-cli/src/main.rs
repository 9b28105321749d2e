//! Covault CLI - a shared credential vault for teams
//!
//! This is the command-line interface for Covault. Accounts, their encrypted
//! secrets, history snapshots, and access grants are all managed through the
//! `covault` binary against a local vault database.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;
mod ui;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::admin::NamedKind;
use crate::commands::{accounts, admin, files, grants, history, init, misc, rotate};
use crate::errors::CliError;
use crate::ui::{print_error, UiContext};

fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr so stdout stays parseable. Secrets are
    // never logged; core events carry ids and counts only.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        // Coded CLI errors carry their own exit codes
        if let Some(cli_error) = e.downcast_ref::<CliError>() {
            cli_error.exit();
        }

        let ui_ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
        let error_msg = format!("{}", e);
        let hint = extract_error_hint(&error_msg);
        let message = match error_msg.find("\nHint:") {
            Some(idx) => error_msg[..idx].to_string(),
            None => error_msg,
        };

        print_error(&ui_ctx, &message, hint.as_deref());
        std::process::exit(1);
    }
}

/// Extract the hint embedded in an error message, or supply one for the
/// known failure texts. The renderer adds its own "Hint:" label.
fn extract_error_hint(error: &str) -> Option<String> {
    if let Some(idx) = error.find("\nHint:") {
        return Some(error[idx + "\nHint:".len()..].trim_start().to_string());
    }

    let error_lower = error.to_lowercase();

    if error_lower.contains("vault database not found") {
        return Some("Run `covault init` to create a vault.".to_string());
    }

    // Optimistic-concurrency conflict
    if error_lower.contains("changed since it was read") {
        return Some(
            "Someone else edited this account. Re-run `covault show` and retry.".to_string(),
        );
    }

    if error_lower.contains("changed during rotation") {
        return Some(
            "The vault was edited while rotating. Retry once writers have finished.".to_string(),
        );
    }

    // Duplicate login
    if error_lower.contains("already in use") {
        return Some("Pick a different login.".to_string());
    }

    None
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => {
            init::handle_init(cli, args)?;
        }
        Some(Commands::Add(args)) => {
            accounts::handle_add(cli, args)?;
        }
        Some(Commands::List(args)) => {
            accounts::handle_list(cli, args)?;
        }
        Some(Commands::Search(args)) => {
            accounts::handle_search(cli, args)?;
        }
        Some(Commands::Show(args)) => {
            accounts::handle_show(cli, args)?;
        }
        Some(Commands::Pass(args)) => {
            accounts::handle_pass(cli, args)?;
        }
        Some(Commands::Edit(args)) => {
            accounts::handle_edit(cli, args)?;
        }
        Some(Commands::EditPass(args)) => {
            accounts::handle_edit_pass(cli, args)?;
        }
        Some(Commands::Rm(args)) => {
            accounts::handle_rm(cli, args)?;
        }
        Some(Commands::Copy(args)) => {
            accounts::handle_copy(cli, args)?;
        }
        Some(Commands::Favorite(args)) => {
            accounts::handle_favorite(cli, args, true)?;
        }
        Some(Commands::Unfavorite(args)) => {
            accounts::handle_favorite(cli, args, false)?;
        }
        Some(Commands::History(args)) => {
            history::handle_history(cli, args)?;
        }
        Some(Commands::Grant(args)) => {
            grants::handle_grant(cli, args)?;
        }
        Some(Commands::Attach(args)) => {
            files::handle_attach(cli, args)?;
        }
        Some(Commands::Files(args)) => {
            files::handle_files(cli, args)?;
        }
        Some(Commands::Detach(args)) => {
            files::handle_detach(cli, args)?;
        }
        Some(Commands::RotateMaster(args)) => {
            rotate::handle_rotate_master(cli, args)?;
        }
        Some(Commands::User(args)) => {
            admin::handle_user(cli, args)?;
        }
        Some(Commands::Group(args)) => {
            admin::handle_named(cli, NamedKind::Group, args)?;
        }
        Some(Commands::Category(args)) => {
            admin::handle_named(cli, NamedKind::Category, args)?;
        }
        Some(Commands::Client(args)) => {
            admin::handle_named(cli, NamedKind::Client, args)?;
        }
        Some(Commands::Tag(args)) => {
            admin::handle_named(cli, NamedKind::Tag, args)?;
        }
        Some(Commands::Preset(args)) => {
            admin::handle_preset(cli, args)?;
        }
        Some(Commands::Completions(args)) => {
            misc::handle_completions(args)?;
        }
        None => {
            print_quickstart();
        }
    }
    Ok(())
}

fn print_quickstart() {
    println!("covault - a shared credential vault for teams");
    println!();
    println!("Quickstart:");
    println!("  covault init                  Create a vault and its first admin");
    println!("  covault add <NAME>            Store an account with a secret");
    println!("  covault list                  List accounts visible to you");
    println!("  covault search <TEXT>         Search by name, login, URL or notes");
    println!("  covault pass <ID>             Reveal an account's secret");
    println!("  covault history list <ID>     Inspect an account's snapshots");
    println!();
    println!("Run `covault --help` for the full command list.");
}
