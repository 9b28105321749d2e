use chrono::Utc;
use secrecy::ExposeSecret;

use covault_core::acl::AccountAcl;
use covault_core::search::{AccountSearchFilter, SortKey, SortOrder};
use covault_core::storage::types::{Account, AccountUpdate, NewAccount};

use crate::app::{open_session, vault_result, VaultSession};
use crate::cli::{
    AddArgs, Cli, CopyArgs, EditArgs, EditPassArgs, FavoriteArgs, FilterArgs, ListArgs, PassArgs,
    RmArgs, SearchArgs, ShowArgs, SortField,
};
use crate::helpers::{
    confirm_destructive, parse_datetime, parse_id, read_secret, resolve_category, resolve_client,
    resolve_group, resolve_tags,
};
use crate::output::{account_json, account_row, accounts_json, acl_json, format_ts, print_json, short_id};
use crate::ui::{
    badge, blank_line, divider, header, hint, kv, print, receipt, simple_table, Badge, Column,
    UiContext,
};

const DEFAULT_LIST_LIMIT: usize = 20;

const LIST_COLUMNS: [Column; 5] = [
    Column::new("ID"),
    Column::new("Name"),
    Column::new("Login"),
    Column::new("URL"),
    Column::new("Edited"),
];

pub fn handle_add(cli: &Cli, args: &AddArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let mut vs = open_session(cli)?;

    let mut new = NewAccount::new(args.name.clone())
        .with_login(args.login.clone())
        .with_url(args.url.clone())
        .with_notes(args.notes.clone());
    if let Some(name) = &args.category {
        let categories = vault_result(vs.vault.list_categories(&vs.session))?;
        new = new.with_category(resolve_category(&categories, name)?.id);
    }
    if let Some(name) = &args.client {
        let clients = vault_result(vs.vault.list_clients(&vs.session))?;
        new = new.with_client(resolve_client(&clients, name)?.id);
    }
    if let Some(name) = &args.group {
        let groups = vault_result(vs.vault.list_groups(&vs.session))?;
        new = new.with_group(resolve_group(&groups, name)?.id);
    }
    if !args.tag.is_empty() {
        let tags = vault_result(vs.vault.list_tags(&vs.session))?;
        new = new.with_tags(resolve_tags(&tags, &args.tag)?);
    }
    if args.private {
        new = new.private();
    }
    if args.private_group {
        new = new.private_group();
    }
    new = new
        .with_other_user_edit(args.other_user_edit)
        .with_other_user_group_edit(args.other_group_edit);
    if let Some(when) = &args.expires {
        new = new.with_pass_date_change(parse_datetime(when)?);
    }

    let secret = read_secret("Account secret")?;
    let account = vault_result(vs.vault.create_account(&vs.session, new, &secret))?;

    if ctx.mode.is_json() {
        return print_json(&account_json(&account));
    }
    if !cli.quiet {
        let id = short_id(account.id);
        println!(
            "{}",
            receipt(
                &ctx,
                "Added account",
                &[("Id", id.as_str()), ("Name", account.name.as_str())],
            )
        );
    }
    Ok(())
}

pub fn handle_list(cli: &Cli, args: &ListArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let vs = open_session(cli)?;
    let filter = build_filter(&vs, &args.filter, None)?;
    let accounts = vault_result(vs.vault.search_accounts(&vs.session, &filter))?;
    print_listing(cli, &ctx, "list", None, &accounts)
}

pub fn handle_search(cli: &Cli, args: &SearchArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let vs = open_session(cli)?;
    let filter = build_filter(&vs, &args.filter, Some(&args.text))?;
    let accounts = vault_result(vs.vault.search_accounts(&vs.session, &filter))?;
    print_listing(cli, &ctx, "search", Some(&args.text), &accounts)
}

pub fn handle_show(cli: &Cli, args: &ShowArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    let (account, acl) = vault_result(vs.vault.get_account(&vs.session, id))?;

    if ctx.mode.is_json() {
        let mut value = account_json(&account);
        value["acl"] = acl_json(&acl);
        return print_json(&value);
    }

    println!("{}", header(&ctx, "show", Some(&account.name)));
    println!("{}", kv(&ctx, "Id", &account.id.to_string()));
    println!("{}", kv(&ctx, "Name", &account.name));
    println!("{}", kv(&ctx, "Login", &account.login));
    if !account.url.is_empty() {
        println!("{}", kv(&ctx, "URL", &account.url));
    }
    if !account.notes.is_empty() {
        println!("{}", kv(&ctx, "Notes", &account.notes));
    }
    print_taxonomy(&ctx, &vs, &account)?;
    if account.is_private {
        println!("{}", kv(&ctx, "Privacy", "private to owner"));
    }
    if account.is_private_group {
        println!("{}", kv(&ctx, "Privacy", "private to owning group"));
    }
    println!("{}", kv(&ctx, "Pass Date", &format_ts(account.pass_date)));
    if let Some(due) = account.pass_date_change {
        println!("{}", kv(&ctx, "Change Due", &format_ts(due)));
    }
    if let Some(parent) = account.parent_id {
        println!("{}", kv(&ctx, "Copied From", &short_id(parent)));
    }
    println!("{}", divider(&ctx));
    println!(
        "{}",
        kv(
            &ctx,
            "Counters",
            &format!(
                "{} views, {} decrypts",
                account.count_view, account.count_decrypt
            ),
        )
    );
    println!("{}", kv(&ctx, "Added", &format_ts(account.date_add)));
    println!("{}", kv(&ctx, "Edited", &format_ts(account.date_edit)));
    println!("{}", kv(&ctx, "Access", &acl_summary(&acl)));
    if acl.can_view_pass && !cli.quiet {
        blank_line(&ctx);
        println!(
            "{}",
            hint(&ctx, &format!("covault pass {}", short_id(account.id)))
        );
    }
    Ok(())
}

pub fn handle_pass(cli: &Cli, args: &PassArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    let secret = vault_result(vs.vault.reveal_secret(&vs.session, id))?;
    // The secret is the output; print it bare so shells can capture it.
    println!("{}", secret.expose_secret());
    Ok(())
}

pub fn handle_edit(cli: &Cli, args: &EditArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    let (account, _) = vault_result(vs.vault.get_account(&vs.session, id))?;

    let mut update = AccountUpdate::from_account(&account);
    if let Some(value) = &args.name {
        update.name = value.clone();
    }
    if let Some(value) = &args.login {
        update.login = value.clone();
    }
    if let Some(value) = &args.url {
        update.url = value.clone();
    }
    if let Some(value) = &args.notes {
        update.notes = value.clone();
    }
    if let Some(name) = &args.category {
        update.category_id = if name.is_empty() {
            None
        } else {
            let categories = vault_result(vs.vault.list_categories(&vs.session))?;
            Some(resolve_category(&categories, name)?.id)
        };
    }
    if let Some(name) = &args.client {
        update.client_id = if name.is_empty() {
            None
        } else {
            let clients = vault_result(vs.vault.list_clients(&vs.session))?;
            Some(resolve_client(&clients, name)?.id)
        };
    }
    if let Some(name) = &args.group {
        let groups = vault_result(vs.vault.list_groups(&vs.session))?;
        update.user_group_id = resolve_group(&groups, name)?.id;
    }
    if let Some(value) = args.private {
        update.is_private = value;
    }
    if let Some(value) = args.private_group {
        update.is_private_group = value;
    }
    if let Some(value) = args.other_user_edit {
        update.other_user_edit = value;
    }
    if let Some(value) = args.other_group_edit {
        update.other_user_group_edit = value;
    }
    if let Some(when) = &args.expires {
        update.pass_date_change = Some(parse_datetime(when)?);
    }

    let updated = vault_result(vs.vault.update_account(&vs.session, id, update))?;

    if args.clear_tags {
        vault_result(vs.vault.set_account_tags(&vs.session, id, &[]))?;
    } else if !args.tag.is_empty() {
        let tags = vault_result(vs.vault.list_tags(&vs.session))?;
        let tag_ids = resolve_tags(&tags, &args.tag)?;
        vault_result(vs.vault.set_account_tags(&vs.session, id, &tag_ids))?;
    }

    if ctx.mode.is_json() {
        return print_json(&account_json(&updated));
    }
    if !cli.quiet {
        let id = short_id(updated.id);
        println!(
            "{}",
            receipt(
                &ctx,
                "Updated account",
                &[("Id", id.as_str()), ("Name", updated.name.as_str())],
            )
        );
    }
    Ok(())
}

pub fn handle_edit_pass(cli: &Cli, args: &EditPassArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    let (account, _) = vault_result(vs.vault.get_account(&vs.session, id))?;

    let secret = read_secret("New account secret")?;
    vault_result(
        vs.vault
            .update_secret(&vs.session, id, &secret, account.date_edit),
    )?;

    if !cli.quiet {
        let id = short_id(account.id);
        println!("{}", receipt(&ctx, "Secret updated", &[("Id", id.as_str())]));
    }
    Ok(())
}

pub fn handle_rm(cli: &Cli, args: &RmArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let id = parse_id(&args.id, "account")?;
    if !confirm_destructive("delete this account", args.yes)? {
        print(&ctx, &badge(&ctx, Badge::Info, "Aborted."));
        return Ok(());
    }
    let mut vs = open_session(cli)?;
    vault_result(vs.vault.delete_account(&vs.session, id))?;

    if !cli.quiet {
        let id = short_id(id);
        println!(
            "{}",
            receipt(&ctx, "Deleted account", &[("Id", id.as_str())])
        );
        println!("{}", hint(&ctx, "A snapshot of the account is kept in history."));
    }
    Ok(())
}

pub fn handle_copy(cli: &Cli, args: &CopyArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(
        args.output.json,
        args.output.format.as_deref(),
        cli.no_color,
        cli.ascii,
    );
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    let copy = vault_result(vs.vault.copy_account(&vs.session, id, args.new_name.clone()))?;

    if ctx.mode.is_json() {
        return print_json(&account_json(&copy));
    }
    if !cli.quiet {
        let new_id = short_id(copy.id);
        let source = short_id(id);
        println!(
            "{}",
            receipt(
                &ctx,
                "Copied account",
                &[
                    ("Id", new_id.as_str()),
                    ("Name", copy.name.as_str()),
                    ("Source", source.as_str()),
                ],
            )
        );
    }
    Ok(())
}

pub fn handle_favorite(cli: &Cli, args: &FavoriteArgs, add: bool) -> anyhow::Result<()> {
    let id = parse_id(&args.id, "account")?;
    let mut vs = open_session(cli)?;
    if add {
        vault_result(vs.vault.add_favorite(&vs.session, id))?;
    } else {
        vault_result(vs.vault.remove_favorite(&vs.session, id))?;
    }
    if !cli.quiet {
        println!(
            "{} {}",
            if add { "Favorited" } else { "Unfavorited" },
            short_id(id)
        );
    }
    Ok(())
}

// --- shared pieces ---

fn build_filter(
    vs: &VaultSession,
    args: &FilterArgs,
    text: Option<&str>,
) -> anyhow::Result<AccountSearchFilter> {
    let mut filter = AccountSearchFilter::new();
    if let Some(needle) = text {
        filter = filter.text(needle);
    }
    if let Some(name) = &args.category {
        let categories = vault_result(vs.vault.list_categories(&vs.session))?;
        filter = filter.category(resolve_category(&categories, name)?.id);
    }
    if let Some(name) = &args.client {
        let clients = vault_result(vs.vault.list_clients(&vs.session))?;
        filter = filter.client(resolve_client(&clients, name)?.id);
    }
    if !args.tag.is_empty() {
        let tags = vault_result(vs.vault.list_tags(&vs.session))?;
        filter = filter.tags(resolve_tags(&tags, &args.tag)?);
        if args.all_tags {
            filter = filter.tags_all();
        }
    }
    if args.favorites {
        filter = filter.favorites();
    }
    if args.expired {
        filter = filter.expired_as_of(Utc::now());
    }
    if args.current {
        filter = filter.not_expired_as_of(Utc::now());
    }
    if let Some(needle) = &args.owner {
        filter = filter.owner(needle.clone());
    }
    if let Some(needle) = &args.group {
        filter = filter.group_name(needle.clone());
    }
    if let Some(needle) = &args.file {
        filter = filter.file_name(needle.clone());
    }
    if let Some(pattern) = &args.name_regex {
        filter = filter.name_regex(pattern.clone());
    }
    if let Some(field) = args.sort {
        let order = if args.desc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        filter = filter.sort(sort_key(field), order);
    } else if args.top_viewed {
        filter = filter.most_viewed_first();
    }
    match args.limit {
        Some(0) => {} // 0 means unlimited
        Some(n) => filter = filter.limit(n),
        None => filter = filter.limit(DEFAULT_LIST_LIMIT),
    }
    if let Some(n) = args.offset {
        filter = filter.offset(n);
    }
    Ok(filter)
}

fn sort_key(field: SortField) -> SortKey {
    match field {
        SortField::Name => SortKey::Name,
        SortField::Category => SortKey::Category,
        SortField::Login => SortKey::Login,
        SortField::Url => SortKey::Url,
        SortField::Client => SortKey::Client,
    }
}

fn print_listing(
    cli: &Cli,
    ctx: &UiContext,
    command: &str,
    context: Option<&str>,
    accounts: &[Account],
) -> anyhow::Result<()> {
    if ctx.mode.is_json() {
        return print_json(&serde_json::Value::Array(accounts_json(accounts)));
    }
    if !cli.quiet {
        println!("{}", header(ctx, command, context));
    }
    if accounts.is_empty() {
        if !cli.quiet {
            print(ctx, "No accounts found.");
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = accounts.iter().map(account_row).collect();
    println!("{}", simple_table(ctx, &LIST_COLUMNS, &rows));
    if !cli.quiet {
        println!("{}", hint(ctx, "covault show <ID> for details"));
    }
    Ok(())
}

fn print_taxonomy(ctx: &UiContext, vs: &VaultSession, account: &Account) -> anyhow::Result<()> {
    if let Some(category_id) = account.category_id {
        let categories = vault_result(vs.vault.list_categories(&vs.session))?;
        if let Some(category) = categories.iter().find(|c| c.id == category_id) {
            println!("{}", kv(ctx, "Category", &category.name));
        }
    }
    if let Some(client_id) = account.client_id {
        let clients = vault_result(vs.vault.list_clients(&vs.session))?;
        if let Some(client) = clients.iter().find(|c| c.id == client_id) {
            println!("{}", kv(ctx, "Client", &client.name));
        }
    }
    let groups = vault_result(vs.vault.list_groups(&vs.session))?;
    if let Some(group) = groups.iter().find(|g| g.id == account.user_group_id) {
        println!("{}", kv(ctx, "Group", &group.name));
    }
    let tags = vault_result(vs.vault.account_tags(&vs.session, account.id))?;
    if !tags.is_empty() {
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        println!("{}", kv(ctx, "Tags", &names.join(", ")));
    }
    Ok(())
}

fn acl_summary(acl: &AccountAcl) -> String {
    let mut parts = Vec::new();
    if acl.can_view {
        parts.push("view");
    }
    if acl.can_view_pass {
        parts.push("view-pass");
    }
    if acl.can_edit {
        parts.push("edit");
    }
    if acl.can_edit_pass {
        parts.push("edit-pass");
    }
    if acl.can_delete {
        parts.push("delete");
    }
    if acl.can_copy {
        parts.push("copy");
    }
    if acl.can_restore {
        parts.push("restore");
    }
    if parts.is_empty() {
        parts.push("none");
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_mapping_is_total() {
        let fields = [
            SortField::Name,
            SortField::Category,
            SortField::Login,
            SortField::Url,
            SortField::Client,
        ];
        for field in fields {
            // Every CLI sort field maps onto a query sort key.
            let _ = sort_key(field);
        }
    }

    #[test]
    fn test_acl_summary_denied_reads_none() {
        assert_eq!(acl_summary(&AccountAcl::default()), "none");
    }

    #[test]
    fn test_acl_summary_lists_capabilities() {
        let acl = AccountAcl {
            can_view: true,
            can_view_pass: true,
            ..AccountAcl::default()
        };
        assert_eq!(acl_summary(&acl), "view, view-pass");
    }
}
