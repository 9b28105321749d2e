use uuid::Uuid;

use covault_core::acl::preset::{PermissionBundle, PresetTarget};
use covault_core::storage::types::{NewUser, ProfilePermissions, User};

use crate::app::{open_session, vault_result, VaultSession};
use crate::cli::{
    Cli, NamedArgs, NamedSubcommand, OutputArgs, PresetArgs, PresetKind, PresetSubcommand,
    UserArgs, UserSubcommand,
};
use crate::helpers::{parse_id, resolve_group};
use crate::output::{print_json, short_id, user_json};
use crate::ui::{header, print, receipt, simple_table, table, Column, UiContext};

// --- users ---

pub fn handle_user(cli: &Cli, args: &UserArgs) -> anyhow::Result<()> {
    match &args.command {
        UserSubcommand::Add {
            login,
            name,
            group,
            read_only,
            admin_app,
            admin_acc,
        } => handle_user_add(cli, login, name, group.as_deref(), *read_only, *admin_app, *admin_acc),
        UserSubcommand::List { output } => handle_user_list(cli, output),
        UserSubcommand::Disable { login } => handle_user_disabled(cli, login, true),
        UserSubcommand::Enable { login } => handle_user_disabled(cli, login, false),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_user_add(
    cli: &Cli,
    login: &str,
    name: &str,
    group: Option<&str>,
    read_only: bool,
    admin_app: bool,
    admin_acc: bool,
) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let mut vs = open_session(cli)?;

    let group_id = match group {
        Some(group_name) => {
            let groups = vault_result(vs.vault.list_groups(&vs.session))?;
            resolve_group(&groups, group_name)?.id
        }
        None => vs.session.user().user_group_id,
    };
    let profile = if read_only {
        ProfilePermissions::read_only()
    } else {
        ProfilePermissions::all()
    };
    let mut new = NewUser::new(login, group_id)
        .with_name(name)
        .with_profile(profile);
    if admin_app {
        new = new.admin_app();
    }
    if admin_acc {
        new = new.admin_acc();
    }
    let user = vault_result(vs.vault.create_user(&vs.session, new))?;

    if !cli.quiet {
        println!(
            "{}",
            receipt(&ctx, "User created", &[("Login", user.login.as_str())])
        );
    }
    Ok(())
}

fn handle_user_list(cli: &Cli, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let vs = open_session(cli)?;
    let users = vault_result(vs.vault.list_users(&vs.session))?;

    if ctx.mode.is_json() {
        let values: Vec<serde_json::Value> = users.iter().map(user_json).collect();
        return print_json(&serde_json::Value::Array(values));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, "user list", None));
    }
    let columns = [
        Column::new("Login"),
        Column::new("Name"),
        Column::new("Role"),
        Column::new("Status"),
        Column::new("Key Ver"),
    ];
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|user| {
            vec![
                user.login.clone(),
                user.name.clone(),
                role_label(user).to_string(),
                if user.is_disabled {
                    "disabled".to_string()
                } else {
                    "active".to_string()
                },
                user.last_key_update.to_string(),
            ]
        })
        .collect();
    println!("{}", simple_table(&ctx, &columns, &rows));
    Ok(())
}

fn handle_user_disabled(cli: &Cli, login: &str, disabled: bool) -> anyhow::Result<()> {
    let mut vs = open_session(cli)?;
    let user = vault_result(vs.vault.find_user(&vs.session, login))?;
    vault_result(vs.vault.set_user_disabled(&vs.session, user.id, disabled))?;
    if !cli.quiet {
        println!(
            "{} user {}",
            if disabled { "Disabled" } else { "Enabled" },
            login
        );
    }
    Ok(())
}

fn role_label(user: &User) -> &'static str {
    if user.is_admin_app {
        "admin"
    } else if user.is_admin_acc {
        "accounts-admin"
    } else {
        "user"
    }
}

// --- named records: groups, categories, clients, tags ---

/// Which named-record table a `NamedArgs` invocation addresses.
#[derive(Debug, Clone, Copy)]
pub enum NamedKind {
    Group,
    Category,
    Client,
    Tag,
}

impl NamedKind {
    fn noun(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Category => "category",
            Self::Client => "client",
            Self::Tag => "tag",
        }
    }
}

pub fn handle_named(cli: &Cli, kind: NamedKind, args: &NamedArgs) -> anyhow::Result<()> {
    match &args.command {
        NamedSubcommand::Add { name } => handle_named_add(cli, kind, name),
        NamedSubcommand::List { output } => handle_named_list(cli, kind, output),
    }
}

fn handle_named_add(cli: &Cli, kind: NamedKind, name: &str) -> anyhow::Result<()> {
    let mut vs = open_session(cli)?;
    let (id, stored) = match kind {
        NamedKind::Group => {
            let group = vault_result(vs.vault.create_group(&vs.session, name))?;
            (group.id, group.name)
        }
        NamedKind::Category => {
            let category = vault_result(vs.vault.create_category(&vs.session, name))?;
            (category.id, category.name)
        }
        NamedKind::Client => {
            let client = vault_result(vs.vault.create_client(&vs.session, name))?;
            (client.id, client.name)
        }
        NamedKind::Tag => {
            let tag = vault_result(vs.vault.create_tag(&vs.session, name))?;
            (tag.id, tag.name)
        }
    };
    if !cli.quiet {
        println!("Added {} {} ({})", kind.noun(), stored, short_id(id));
    }
    Ok(())
}

fn handle_named_list(cli: &Cli, kind: NamedKind, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let vs = open_session(cli)?;
    let records: Vec<(Uuid, String)> = match kind {
        NamedKind::Group => vault_result(vs.vault.list_groups(&vs.session))?
            .into_iter()
            .map(|g| (g.id, g.name))
            .collect(),
        NamedKind::Category => vault_result(vs.vault.list_categories(&vs.session))?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect(),
        NamedKind::Client => vault_result(vs.vault.list_clients(&vs.session))?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect(),
        NamedKind::Tag => vault_result(vs.vault.list_tags(&vs.session))?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect(),
    };

    if ctx.mode.is_json() {
        let values: Vec<serde_json::Value> = records
            .iter()
            .map(|(id, name)| serde_json::json!({ "id": id, "name": name }))
            .collect();
        return print_json(&serde_json::Value::Array(values));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, &format!("{} list", kind.noun()), None));
    }
    if records.is_empty() {
        print(&ctx, "Nothing here yet.");
        return Ok(());
    }
    let columns = [Column::new("ID"), Column::new("Name")];
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|(id, name)| vec![short_id(*id), name.clone()])
        .collect();
    println!("{}", simple_table(&ctx, &columns, &rows));
    Ok(())
}

// --- presets ---

pub fn handle_preset(cli: &Cli, args: &PresetArgs) -> anyhow::Result<()> {
    match &args.command {
        PresetSubcommand::Add {
            kind,
            target,
            priority,
            fixed,
            view_user,
            edit_user,
            view_group,
            edit_group,
        } => handle_preset_add(
            cli, *kind, target, *priority, *fixed, view_user, edit_user, view_group, edit_group,
        ),
        PresetSubcommand::List { output } => handle_preset_list(cli, output),
        PresetSubcommand::Rm { id } => handle_preset_rm(cli, id),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_preset_add(
    cli: &Cli,
    kind: PresetKind,
    target: &str,
    priority: i32,
    fixed: bool,
    view_user: &[String],
    edit_user: &[String],
    view_group: &[String],
    edit_group: &[String],
) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, None, cli.no_color, cli.ascii);
    let mut vs = open_session(cli)?;

    let target = match kind {
        PresetKind::User => {
            PresetTarget::User(vault_result(vs.vault.find_user(&vs.session, target))?.id)
        }
        PresetKind::Group => {
            let groups = vault_result(vs.vault.list_groups(&vs.session))?;
            PresetTarget::Group(resolve_group(&groups, target)?.id)
        }
        PresetKind::Profile => PresetTarget::Profile(parse_id(target, "profile")?),
    };

    let bundle = PermissionBundle {
        view_users: resolve_logins(&vs, view_user)?,
        edit_users: resolve_logins(&vs, edit_user)?,
        view_groups: resolve_group_names(&vs, view_group)?,
        edit_groups: resolve_group_names(&vs, edit_group)?,
    };

    let preset = vault_result(
        vs.vault
            .create_preset(&vs.session, priority, fixed, target, bundle),
    )?;

    if !cli.quiet {
        let id = preset.id.to_string();
        let priority = preset.priority.to_string();
        println!(
            "{}",
            receipt(
                &ctx,
                "Preset created",
                &[("Id", id.as_str()), ("Priority", priority.as_str())],
            )
        );
    }
    Ok(())
}

fn handle_preset_list(cli: &Cli, output: &OutputArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(output.json, output.format.as_deref(), cli.no_color, cli.ascii);
    let vs = open_session(cli)?;
    let presets = vault_result(vs.vault.list_presets(&vs.session))?;

    if ctx.mode.is_json() {
        let values: Vec<serde_json::Value> = presets
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "priority": p.priority,
                    "fixed": p.fixed,
                    "target": target_label(&p.target),
                    "view_users": p.bundle.view_users,
                    "edit_users": p.bundle.edit_users,
                    "view_groups": p.bundle.view_groups,
                    "edit_groups": p.bundle.edit_groups,
                })
            })
            .collect();
        return print_json(&serde_json::Value::Array(values));
    }
    if !cli.quiet {
        println!("{}", header(&ctx, "preset list", None));
    }
    if presets.is_empty() {
        print(&ctx, "No presets defined.");
        return Ok(());
    }
    let columns = [
        Column::new("ID"),
        Column::new("Priority"),
        Column::new("Fixed"),
        Column::new("Target"),
        Column::new("Grants"),
    ];
    let rows: Vec<Vec<String>> = presets
        .iter()
        .map(|p| {
            let grants = p.bundle.view_users.len()
                + p.bundle.edit_users.len()
                + p.bundle.view_groups.len()
                + p.bundle.edit_groups.len();
            vec![
                short_id(p.id),
                p.priority.to_string(),
                if p.fixed { "yes" } else { "no" }.to_string(),
                target_label(&p.target),
                grants.to_string(),
            ]
        })
        .collect();
    println!("{}", table(&ctx, &columns, &rows));
    Ok(())
}

fn handle_preset_rm(cli: &Cli, id: &str) -> anyhow::Result<()> {
    let preset_id = parse_id(id, "preset")?;
    let mut vs = open_session(cli)?;
    vault_result(vs.vault.delete_preset(&vs.session, preset_id))?;
    if !cli.quiet {
        println!("Deleted preset {}", short_id(preset_id));
    }
    Ok(())
}

fn target_label(target: &PresetTarget) -> String {
    match target {
        PresetTarget::User(id) => format!("user {}", short_id(*id)),
        PresetTarget::Group(id) => format!("group {}", short_id(*id)),
        PresetTarget::Profile(id) => format!("profile {}", short_id(*id)),
    }
}

fn resolve_logins(vs: &VaultSession, logins: &[String]) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(logins.len());
    for login in logins {
        ids.push(vault_result(vs.vault.find_user(&vs.session, login))?.id);
    }
    Ok(ids)
}

fn resolve_group_names(vs: &VaultSession, names: &[String]) -> anyhow::Result<Vec<Uuid>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let groups = vault_result(vs.vault.list_groups(&vs.session))?;
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(resolve_group(&groups, name)?.id);
    }
    Ok(ids)
}
