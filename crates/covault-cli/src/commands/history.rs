use secrecy::ExposeSecret;

use crate::app::{open_session, vault_result};
use crate::cli::{Cli, HistoryArgs, HistorySubcommand, OutputArgs};
use crate::helpers::{confirm_destructive, parse_id};
use crate::output::{
    account_json, format_ts, history_entries_json, history_json, print_json, short_id,
    snapshot_reason,
};
use crate::ui::{badge, header, hint, kv, print, receipt, simple_table, Badge, Column, UiContext};

const HISTORY_COLUMNS: [Column; 5] = [
    Column::new("ID"),
    Column::new("Taken"),
    Column::new("Reason"),
    Column::new("Name"),
    Column::new("Login"),
];

pub fn handle_history(cli: &Cli, args: &HistoryArgs) -> anyhow::Result<()> {
    match &args.command {
        HistorySubcommand::List { account, output } => handle_list(cli, account, output),
        HistorySubcommand::Show { entry, output } => handle_show(cli, entry, output),
        HistorySubcommand::Pass { entry } => handle_pass(cli, entry),
        HistorySubcommand::Restore { entry, output } => handle_restore(cli, entry, output),
        HistorySubcommand::Rm { entries, yes } => handle_rm(cli, entries, *yes),
        HistorySubcommand::Purge { account, yes } => handle_purge(cli, account, *yes),
    }
}

fn handle_list(cli: &Cli, account: &str, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let account_id = parse_id(account, "account")?;
    let vs = open_session(cli)?;
    let entries = vault_result(vs.vault.list_history(&vs.session, account_id))?;

    if ctx.mode.is_json() {
        return print_json(&serde_json::Value::Array(history_entries_json(&entries)));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, "history", Some(&short_id(account_id))));
    }
    if entries.is_empty() {
        if !cli.quiet {
            print(&ctx, "No snapshots yet.");
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                short_id(entry.id),
                format_ts(entry.date),
                snapshot_reason(entry).to_string(),
                entry.name.clone(),
                entry.login.clone(),
            ]
        })
        .collect();
    println!("{}", simple_table(&ctx, &HISTORY_COLUMNS, &rows));
    if !cli.quiet {
        println!("{}", hint(&ctx, "covault history show <ENTRY> for details"));
    }
    Ok(())
}

fn handle_show(cli: &Cli, entry: &str, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let entry_id = parse_id(entry, "history entry")?;
    let vs = open_session(cli)?;
    let entry = vault_result(vs.vault.get_history_entry(&vs.session, entry_id))?;

    if ctx.mode.is_json() {
        return print_json(&history_json(&entry));
    }
    println!("{}", header(&ctx, "history show", Some(&entry.name)));
    println!("{}", kv(&ctx, "Id", &entry.id.to_string()));
    println!("{}", kv(&ctx, "Account", &entry.account_id.to_string()));
    println!("{}", kv(&ctx, "Taken", &format_ts(entry.date)));
    println!("{}", kv(&ctx, "Reason", snapshot_reason(&entry)));
    println!("{}", kv(&ctx, "Name", &entry.name));
    println!("{}", kv(&ctx, "Login", &entry.login));
    if !entry.url.is_empty() {
        println!("{}", kv(&ctx, "URL", &entry.url));
    }
    if !entry.notes.is_empty() {
        println!("{}", kv(&ctx, "Notes", &entry.notes));
    }
    println!("{}", kv(&ctx, "Pass Date", &format_ts(entry.pass_date)));
    println!("{}", kv(&ctx, "Edited", &format_ts(entry.date_edit)));
    Ok(())
}

fn handle_pass(cli: &Cli, entry: &str) -> anyhow::Result<()> {
    let entry_id = parse_id(entry, "history entry")?;
    let vs = open_session(cli)?;
    let secret = vault_result(vs.vault.reveal_history_secret(&vs.session, entry_id))?;
    println!("{}", secret.expose_secret());
    Ok(())
}

fn handle_restore(cli: &Cli, entry: &str, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let entry_id = parse_id(entry, "history entry")?;
    let mut vs = open_session(cli)?;
    let account = vault_result(vs.vault.restore_from_history(&vs.session, entry_id))?;

    if ctx.mode.is_json() {
        return print_json(&account_json(&account));
    }
    if !cli.quiet {
        let id = short_id(account.id);
        println!(
            "{}",
            receipt(
                &ctx,
                "Restored account",
                &[("Id", id.as_str()), ("Name", account.name.as_str())],
            )
        );
        println!(
            "{}",
            hint(&ctx, "The pre-restore state was snapshotted to history.")
        );
    }
    Ok(())
}

fn handle_rm(cli: &Cli, entries: &[String], yes: bool) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        ids.push(parse_id(entry, "history entry")?);
    }
    if !confirm_destructive("delete these snapshots", yes)? {
        print(&ctx, &badge(&ctx, Badge::Info, "Aborted."));
        return Ok(());
    }
    let mut vs = open_session(cli)?;
    let deleted = vault_result(vs.vault.delete_history_entries(&vs.session, &ids))?;

    if !cli.quiet {
        let count = deleted.to_string();
        println!(
            "{}",
            receipt(&ctx, "Deleted snapshots", &[("Count", count.as_str())])
        );
    }
    Ok(())
}

fn handle_purge(cli: &Cli, account: &str, yes: bool) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let account_id = parse_id(account, "account")?;
    if !confirm_destructive("purge this account's history", yes)? {
        print(&ctx, &badge(&ctx, Badge::Info, "Aborted."));
        return Ok(());
    }
    let mut vs = open_session(cli)?;
    let deleted = vault_result(vs.vault.purge_account_history(&vs.session, account_id))?;

    if !cli.quiet {
        let count = deleted.to_string();
        println!(
            "{}",
            receipt(&ctx, "Purged history", &[("Count", count.as_str())])
        );
    }
    Ok(())
}
