//! The listing scope and the per-item evaluator are two renditions of
//! one authorization decision. These tests drive randomized ownership,
//! grant, privacy, profile and preset combinations through both and
//! require that they never disagree on visibility, then pin down the
//! descriptive filters with a seeded store.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

use covault_core::acl::preset::{
    merge_grants, DefaultPermissionPreset, PermissionBundle, PresetTarget,
};
use covault_core::acl::{evaluate, AclPolicy, AclRequest, CallerContext};
use covault_core::search::{AccountQueryBuilder, AccountSearchFilter, SortKey, SortOrder};
use covault_core::storage::types::{
    Account, AccountGrants, GroupGrant, ProfilePermissions, Tag, User, UserGrant, UserGroup,
};
use covault_core::storage::{SqliteVaultStore, VaultStore};

const USERS: usize = 3;
const GROUPS: usize = 2;

/// One randomized account: who owns it, how it is narrowed, and which
/// explicit grant rows it carries (`Some(is_edit)` per user/group).
#[derive(Debug, Clone)]
struct AccountConfig {
    owner: usize,
    privacy: u8,
    other_user_edit: bool,
    other_user_group_edit: bool,
    user_grants: Vec<Option<bool>>,
    group_grants: Vec<Option<bool>>,
}

fn account_config() -> impl Strategy<Value = AccountConfig> {
    (
        0..USERS,
        0..3u8,
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec(prop::option::of(any::<bool>()), USERS),
        prop::collection::vec(prop::option::of(any::<bool>()), GROUPS),
    )
        .prop_map(
            |(owner, privacy, other_user_edit, other_user_group_edit, user_grants, group_grants)| {
                AccountConfig {
                    owner,
                    privacy,
                    other_user_edit,
                    other_user_group_edit,
                    user_grants,
                    group_grants,
                }
            },
        )
}

/// One randomized preset: which owner context it targets, whether it
/// stands against explicit grant rows, and who its bundle names
/// (`Some(is_edit)` per user/group).
#[derive(Debug, Clone)]
struct PresetConfig {
    target_user: bool,
    user_target: usize,
    group_target: usize,
    fixed: bool,
    user_members: Vec<Option<bool>>,
    group_members: Vec<Option<bool>>,
}

fn preset_config() -> impl Strategy<Value = PresetConfig> {
    (
        any::<bool>(),
        0..USERS,
        0..GROUPS,
        any::<bool>(),
        prop::collection::vec(prop::option::of(any::<bool>()), USERS),
        prop::collection::vec(prop::option::of(any::<bool>()), GROUPS),
    )
        .prop_map(
            |(target_user, user_target, group_target, fixed, user_members, group_members)| {
                PresetConfig {
                    target_user,
                    user_target,
                    group_target,
                    fixed,
                    user_members,
                    group_members,
                }
            },
        )
}

fn base_account(n: usize, owner: &User) -> Account {
    let now = Utc::now();
    Account {
        id: Uuid::new_v4(),
        name: format!("account-{}", n),
        login: String::new(),
        url: String::new(),
        notes: String::new(),
        category_id: None,
        client_id: None,
        user_id: owner.id,
        user_group_id: owner.user_group_id,
        user_edit_id: None,
        key: b"wrapped".to_vec(),
        pass: b"sealed".to_vec(),
        key_hash: "fp-1".to_string(),
        is_private: false,
        is_private_group: false,
        other_user_group_edit: false,
        other_user_edit: false,
        pass_date: now,
        pass_date_change: None,
        parent_id: None,
        count_view: 0,
        count_decrypt: 0,
        date_add: now,
        date_edit: now,
    }
}

/// Two groups, three users (the first two share a group), a preset row
/// per preset config and one account row per account config, all
/// inserted straight into the store.
fn build_world(
    user_flags: &[(bool, bool, bool)],
    configs: &[AccountConfig],
    preset_cfgs: &[PresetConfig],
) -> (
    TempDir,
    SqliteVaultStore,
    Vec<User>,
    Vec<(Account, AccountGrants)>,
    Vec<DefaultPermissionPreset>,
) {
    let dir = tempdir().expect("temp dir should be available");
    let mut store =
        SqliteVaultStore::create(&dir.path().join("listing.db")).expect("create store");

    let groups: Vec<UserGroup> = (0..GROUPS)
        .map(|i| UserGroup {
            id: Uuid::new_v4(),
            name: format!("group-{}", i),
        })
        .collect();
    for group in &groups {
        store.insert_group(group).expect("insert group");
    }

    let users: Vec<User> = user_flags
        .iter()
        .enumerate()
        .map(|(i, &(is_admin_app, is_admin_acc, acc_view))| User {
            id: Uuid::new_v4(),
            login: format!("user-{}", i),
            name: format!("User {}", i),
            user_group_id: groups[if i < 2 { 0 } else { 1 }].id,
            profile_id: None,
            profile: ProfilePermissions {
                acc_view,
                ..ProfilePermissions::all()
            },
            is_admin_app,
            is_admin_acc,
            is_disabled: false,
            last_key_update: 1,
        })
        .collect();
    for user in &users {
        store.insert_user(user).expect("insert user");
    }

    let presets: Vec<DefaultPermissionPreset> = preset_cfgs
        .iter()
        .enumerate()
        .map(|(n, cfg)| DefaultPermissionPreset {
            id: Uuid::new_v4(),
            // Deliberate collisions so the list-position tie break is
            // exercised alongside the priority ordering.
            priority: (n / 2) as i32,
            fixed: cfg.fixed,
            target: if cfg.target_user {
                PresetTarget::User(users[cfg.user_target].id)
            } else {
                PresetTarget::Group(groups[cfg.group_target].id)
            },
            bundle: preset_bundle(cfg, &users, &groups),
        })
        .collect();
    for preset in &presets {
        store.insert_preset(preset).expect("insert preset");
    }

    let mut accounts = Vec::new();
    for (n, cfg) in configs.iter().enumerate() {
        let mut account = base_account(n, &users[cfg.owner]);
        account.is_private = cfg.privacy == 1;
        account.is_private_group = cfg.privacy == 2;
        account.other_user_edit = cfg.other_user_edit;
        account.other_user_group_edit = cfg.other_user_group_edit;
        store.insert_account(&account).expect("insert account");

        let grants = AccountGrants {
            users: cfg
                .user_grants
                .iter()
                .enumerate()
                .filter_map(|(i, g)| {
                    g.map(|is_edit| UserGrant {
                        user_id: users[i].id,
                        is_edit,
                    })
                })
                .collect(),
            groups: cfg
                .group_grants
                .iter()
                .enumerate()
                .filter_map(|(i, g)| {
                    g.map(|is_edit| GroupGrant {
                        user_group_id: groups[i].id,
                        is_edit,
                    })
                })
                .collect(),
        };
        if !grants.is_empty() {
            store
                .set_account_grants(account.id, &grants)
                .expect("set grants");
        }
        accounts.push((account, grants));
    }

    (dir, store, users, accounts, presets)
}

fn preset_bundle(cfg: &PresetConfig, users: &[User], groups: &[UserGroup]) -> PermissionBundle {
    let mut bundle = PermissionBundle::default();
    for (i, membership) in cfg.user_members.iter().enumerate() {
        match membership {
            Some(true) => bundle.edit_users.push(users[i].id),
            Some(false) => bundle.view_users.push(users[i].id),
            None => {}
        }
    }
    for (i, membership) in cfg.group_members.iter().enumerate() {
        match membership {
            Some(true) => bundle.edit_groups.push(groups[i].id),
            Some(false) => bundle.view_groups.push(groups[i].id),
            None => {}
        }
    }
    bundle
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_listing_membership_matches_per_item_view(
        user_flags in prop::collection::vec(
            (any::<bool>(), any::<bool>(), any::<bool>()),
            USERS,
        ),
        configs in prop::collection::vec(account_config(), 1..7),
        preset_cfgs in prop::collection::vec(preset_config(), 0..4),
    ) {
        let (_dir, store, users, accounts, presets) =
            build_world(&user_flags, &configs, &preset_cfgs);
        let policy = AclPolicy::default();

        for user in &users {
            let caller = CallerContext::for_user(user);
            let query = AccountQueryBuilder::for_caller(&caller, &presets).build();
            let listed: HashSet<Uuid> = store
                .search_accounts(&query)
                .expect("search")
                .iter()
                .map(|a| a.id)
                .collect();

            for (account, grants) in &accounts {
                let merged = merge_grants(
                    grants,
                    &presets,
                    account.user_id,
                    account.user_group_id,
                    None,
                );
                let request = AclRequest::from_account(account, merged);
                let acl = evaluate(&request, &caller, &policy);
                prop_assert_eq!(
                    listed.contains(&account.id),
                    acl.can_view,
                    "{} on {}: listing and evaluation disagree",
                    &user.login,
                    &account.name
                );
            }
        }
    }
}

/// One owner with a handful of accounts, for exercising the filters on
/// top of a scope that admits everything the owner has.
struct Seeded {
    _dir: TempDir,
    store: SqliteVaultStore,
    owner: User,
    accounts: Vec<Account>,
}

impl Seeded {
    fn run(&self, filter: &AccountSearchFilter) -> Vec<String> {
        let caller = CallerContext::for_user(&self.owner);
        let query = AccountQueryBuilder::for_caller(&caller, &[])
            .with_filter(filter)
            .build();
        self.store
            .search_accounts(&query)
            .expect("search")
            .into_iter()
            .map(|a| a.name)
            .collect()
    }
}

fn seeded(names: &[&str]) -> Seeded {
    let dir = tempdir().expect("temp dir should be available");
    let mut store = SqliteVaultStore::create(&dir.path().join("seeded.db")).expect("create store");

    let group = UserGroup {
        id: Uuid::new_v4(),
        name: "team".to_string(),
    };
    store.insert_group(&group).expect("insert group");
    let owner = User {
        id: Uuid::new_v4(),
        login: "owner".to_string(),
        name: "Owner".to_string(),
        user_group_id: group.id,
        profile_id: None,
        profile: ProfilePermissions::all(),
        is_admin_app: false,
        is_admin_acc: false,
        is_disabled: false,
        last_key_update: 1,
    };
    store.insert_user(&owner).expect("insert user");

    let accounts: Vec<Account> = names
        .iter()
        .enumerate()
        .map(|(n, name)| {
            let mut account = base_account(n, &owner);
            account.name = name.to_string();
            store.insert_account(&account).expect("insert account");
            account
        })
        .collect();

    Seeded {
        _dir: dir,
        store,
        owner,
        accounts,
    }
}

fn insert_tags(seeded: &mut Seeded, names: &[&str]) -> Vec<Tag> {
    names
        .iter()
        .map(|name| {
            let tag = Tag {
                id: Uuid::new_v4(),
                name: name.to_string(),
            };
            seeded.store.insert_tag(&tag).expect("insert tag");
            tag
        })
        .collect()
}

#[test]
fn test_tag_filter_and_or_semantics() {
    let mut s = seeded(&["tagged", "untagged"]);
    let tags = insert_tags(&mut s, &["one", "two", "three", "four"]);
    let tagged = s.accounts[0].id;
    s.store
        .set_account_tags(tagged, &[tags[0].id, tags[1].id, tags[2].id])
        .expect("set tags");

    // Tagged {1,2,3}; each case queries with a different demand.
    let all_of = |ids: Vec<Uuid>| AccountSearchFilter::new().tags(ids).tags_all();
    let any_of = |ids: Vec<Uuid>| AccountSearchFilter::new().tags(ids);

    assert_eq!(s.run(&all_of(vec![tags[0].id, tags[1].id])), ["tagged"]);
    assert!(s.run(&all_of(vec![tags[0].id, tags[3].id])).is_empty());
    assert!(s.run(&any_of(vec![tags[3].id])).is_empty());
    assert_eq!(s.run(&any_of(vec![tags[0].id, tags[3].id])), ["tagged"]);
}

#[test]
fn test_text_filter_spans_all_text_columns_case_insensitively() {
    let mut s = seeded(&["mail", "web", "db"]);
    s.accounts[1].notes = "the MailServer backup".to_string();
    // Rewrite the row with the note in place.
    let snapshot = dummy_snapshot(&s.accounts[1]);
    s.store
        .update_account(&s.accounts[1], s.accounts[1].date_edit, &snapshot)
        .expect("update");

    let found = s.run(&AccountSearchFilter::new().text("mailserver"));
    assert_eq!(found, ["web"]);
    let found = s.run(&AccountSearchFilter::new().text("MAIL"));
    assert_eq!(found, ["mail", "web"]);
}

#[test]
fn test_favorites_filter_is_per_caller() {
    let mut s = seeded(&["starred", "plain"]);
    let other = Uuid::new_v4();
    let other_user = User {
        id: other,
        login: "other".to_string(),
        name: "Other".to_string(),
        user_group_id: s.owner.user_group_id,
        profile_id: None,
        profile: ProfilePermissions::all(),
        is_admin_app: false,
        is_admin_acc: false,
        is_disabled: false,
        last_key_update: 1,
    };
    s.store.insert_user(&other_user).expect("insert user");

    s.store
        .add_favorite(s.accounts[0].id, s.owner.id)
        .expect("favorite");
    s.store
        .add_favorite(s.accounts[1].id, other)
        .expect("favorite");

    assert_eq!(s.run(&AccountSearchFilter::new().favorites()), ["starred"]);
}

#[test]
fn test_expired_filter_uses_change_due_date() {
    let mut s = seeded(&["overdue", "upcoming", "unscheduled"]);
    let now = Utc::now();
    s.accounts[0].pass_date_change = Some(now - Duration::days(3));
    s.accounts[1].pass_date_change = Some(now + Duration::days(3));
    for account in &s.accounts[..2] {
        let snapshot = dummy_snapshot(account);
        s.store
            .update_account(account, account.date_edit, &snapshot)
            .expect("update");
    }

    assert_eq!(
        s.run(&AccountSearchFilter::new().expired_as_of(now)),
        ["overdue"]
    );
    assert_eq!(
        s.run(&AccountSearchFilter::new().not_expired_as_of(now)),
        ["unscheduled", "upcoming"]
    );
}

#[test]
fn test_name_sort_with_limit_and_offset() {
    let s = seeded(&["delta", "alpha", "echo", "charlie", "bravo"]);
    let filter = AccountSearchFilter::new()
        .sort(SortKey::Name, SortOrder::Asc)
        .limit(2)
        .offset(1);
    assert_eq!(s.run(&filter), ["bravo", "charlie"]);

    // Offset alone still pages; SQLite needs the open-ended LIMIT.
    let filter = AccountSearchFilter::new()
        .sort(SortKey::Name, SortOrder::Asc)
        .offset(3);
    assert_eq!(s.run(&filter), ["delta", "echo"]);
}

#[test]
fn test_name_regex_filter() {
    let s = seeded(&["db-primary", "db-replica", "mydb", "web"]);
    let found = s.run(&AccountSearchFilter::new().name_regex("^db-"));
    assert_eq!(found, ["db-primary", "db-replica"]);
}

/// Store-level updates demand a pre-mutation snapshot; these tests do
/// not read history back, so the content only has to satisfy the schema.
fn dummy_snapshot(account: &Account) -> covault_core::storage::types::AccountHistoryEntry {
    covault_core::history::snapshot(account, covault_core::history::SnapshotReason::Modify)
}
