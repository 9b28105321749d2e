use covault_core::storage::types::{GroupGrant, UserGrant};

use crate::app::{open_session, vault_result};
use crate::cli::{Cli, GrantArgs, GrantSubcommand, OutputArgs};
use crate::helpers::{parse_id, resolve_group};
use crate::output::{grants_json, print_json, short_id};
use crate::ui::{header, print, receipt, table, Column, UiContext};

const GRANT_COLUMNS: [Column; 3] = [
    Column::new("Kind"),
    Column::new("Id"),
    Column::new("Access"),
];

pub fn handle_grant(cli: &Cli, args: &GrantArgs) -> anyhow::Result<()> {
    match &args.command {
        GrantSubcommand::List { account, output } => handle_list(cli, account, output),
        GrantSubcommand::User {
            account,
            login,
            edit,
            remove,
        } => handle_user(cli, account, login, *edit, *remove),
        GrantSubcommand::Group {
            account,
            group,
            edit,
            remove,
        } => handle_group(cli, account, group, *edit, *remove),
    }
}

fn handle_list(cli: &Cli, account: &str, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let account_id = parse_id(account, "account")?;
    let vs = open_session(cli)?;
    let grants = vault_result(vs.vault.account_grants(&vs.session, account_id))?;

    if ctx.mode.is_json() {
        return print_json(&grants_json(&grants));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, "grants", Some(&short_id(account_id))));
    }
    if grants.is_empty() {
        print(&ctx, "No explicit grants.");
        return Ok(());
    }
    let mut rows = Vec::new();
    for grant in &grants.users {
        rows.push(vec![
            "user".to_string(),
            grant.user_id.to_string(),
            access_label(grant.is_edit).to_string(),
        ]);
    }
    for grant in &grants.groups {
        rows.push(vec![
            "group".to_string(),
            grant.user_group_id.to_string(),
            access_label(grant.is_edit).to_string(),
        ]);
    }
    println!("{}", table(&ctx, &GRANT_COLUMNS, &rows));
    Ok(())
}

fn handle_user(
    cli: &Cli,
    account: &str,
    login: &str,
    edit: bool,
    remove: bool,
) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let account_id = parse_id(account, "account")?;
    let mut vs = open_session(cli)?;
    let user = vault_result(vs.vault.find_user(&vs.session, login))?;

    let mut grants = vault_result(vs.vault.account_grants(&vs.session, account_id))?;
    grants.users.retain(|g| g.user_id != user.id);
    if !remove {
        grants.users.push(UserGrant {
            user_id: user.id,
            is_edit: edit,
        });
    }
    vault_result(vs.vault.set_account_grants(&vs.session, account_id, &grants))?;

    if !cli.quiet {
        let title = if remove {
            "Grant removed"
        } else {
            "Grant saved"
        };
        let items: Vec<(&str, &str)> = if remove {
            vec![("User", login)]
        } else {
            vec![("User", login), ("Access", access_label(edit))]
        };
        println!("{}", receipt(&ctx, title, &items));
    }
    Ok(())
}

fn handle_group(
    cli: &Cli,
    account: &str,
    group_name: &str,
    edit: bool,
    remove: bool,
) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let account_id = parse_id(account, "account")?;
    let mut vs = open_session(cli)?;
    let groups = vault_result(vs.vault.list_groups(&vs.session))?;
    let group = resolve_group(&groups, group_name)?;

    let mut grants = vault_result(vs.vault.account_grants(&vs.session, account_id))?;
    grants.groups.retain(|g| g.user_group_id != group.id);
    if !remove {
        grants.groups.push(GroupGrant {
            user_group_id: group.id,
            is_edit: edit,
        });
    }
    vault_result(vs.vault.set_account_grants(&vs.session, account_id, &grants))?;

    if !cli.quiet {
        let title = if remove {
            "Grant removed"
        } else {
            "Grant saved"
        };
        let items: Vec<(&str, &str)> = if remove {
            vec![("Group", group_name)]
        } else {
            vec![("Group", group_name), ("Access", access_label(edit))]
        };
        println!("{}", receipt(&ctx, title, &items));
    }
    Ok(())
}

fn access_label(edit: bool) -> &'static str {
    if edit {
        "edit"
    } else {
        "view"
    }
}
