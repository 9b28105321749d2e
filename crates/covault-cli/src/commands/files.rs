use std::path::Path;

use crate::app::{open_session, vault_result};
use crate::cli::{AttachArgs, Cli, DetachArgs, FilesArgs};
use crate::helpers::parse_id;
use crate::output::{file_json, print_json, short_id};
use crate::ui::{header, print, receipt, simple_table, Column, UiContext};

const FILE_COLUMNS: [Column; 3] = [Column::new("ID"), Column::new("Name"), Column::new("Size")];

pub fn handle_attach(cli: &Cli, args: &AttachArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let account_id = parse_id(&args.account, "account")?;

    let source = Path::new(&args.file);
    let content = std::fs::read(source)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", source.display(), e))?;
    let name = match &args.name {
        Some(value) => value.clone(),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Cannot derive a file name from {}", args.file))?,
    };

    let mut vs = open_session(cli)?;
    let file = vault_result(vs.vault.attach_file(&vs.session, account_id, name, content))?;

    if !cli.quiet {
        let id = short_id(file.id);
        let size = format!("{} bytes", file.size);
        println!(
            "{}",
            receipt(
                &ctx,
                "Attached file",
                &[
                    ("Id", id.as_str()),
                    ("Name", file.name.as_str()),
                    ("Size", size.as_str()),
                ],
            )
        );
    }
    Ok(())
}

pub fn handle_files(cli: &Cli, args: &FilesArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let account_id = parse_id(&args.account, "account")?;
    let vs = open_session(cli)?;
    let files = vault_result(vs.vault.list_files(&vs.session, account_id))?;

    if ctx.mode.is_json() {
        let values: Vec<serde_json::Value> = files.iter().map(file_json).collect();
        return print_json(&serde_json::Value::Array(values));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, "files", Some(&short_id(account_id))));
    }
    if files.is_empty() {
        print(&ctx, "No attached files.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|file| {
            vec![
                short_id(file.id),
                file.name.clone(),
                file.size.to_string(),
            ]
        })
        .collect();
    println!("{}", simple_table(&ctx, &FILE_COLUMNS, &rows));
    Ok(())
}

pub fn handle_detach(cli: &Cli, args: &DetachArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let account_id = parse_id(&args.account, "account")?;
    let file_id = parse_id(&args.file_id, "file")?;
    let mut vs = open_session(cli)?;
    vault_result(vs.vault.remove_file(&vs.session, account_id, file_id))?;

    if !cli.quiet {
        let id = short_id(file_id);
        println!("{}", receipt(&ctx, "Detached file", &[("Id", id.as_str())]));
    }
    Ok(())
}
