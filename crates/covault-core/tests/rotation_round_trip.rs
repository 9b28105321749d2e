//! Master passphrase rotation: re-wrapping, stale-row skipping and the
//! effect on sessions and user key stamps.

use secrecy::{ExposeSecret, SecretString};
use tempfile::{tempdir, TempDir};

use covault_core::storage::types::{NewAccount, NewUser, ProfilePermissions};
use covault_core::storage::SqliteVaultStore;
use covault_core::vault::{Session, Vault};
use covault_core::VaultError;

const MASTER: &str = "the original passphrase";
const ROTATED: &str = "the replacement passphrase";

fn passphrase(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

struct Fixture {
    _dir: TempDir,
    db_path: std::path::PathBuf,
    vault: Vault<SqliteVaultStore>,
    admin: Session,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("temp dir should be available");
    let db_path = dir.path().join("vault.db");
    let mut vault =
        Vault::<SqliteVaultStore>::initialize(&db_path, &passphrase(MASTER), "root")
            .expect("initialize should succeed");
    let admin = vault
        .login("root", &passphrase(MASTER))
        .expect("admin login should succeed");
    Fixture {
        _dir: dir,
        db_path,
        vault,
        admin,
    }
}

#[test]
fn test_rotation_round_trip_restores_sealed_bytes() {
    let mut f = fixture();
    let first = f
        .vault
        .create_account(&f.admin, NewAccount::new("first"), &passphrase("alpha"))
        .expect("create should succeed");
    let second = f
        .vault
        .create_account(&f.admin, NewAccount::new("second"), &passphrase("beta"))
        .expect("create should succeed");

    let report = f
        .vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(MASTER), &passphrase(ROTATED))
        .expect("rotation should succeed");
    assert_eq!(report.new_version, 2);
    assert_eq!(report.accounts_rewrapped, 2);
    assert_eq!(report.history_rewrapped, 0);
    assert!(report.skipped_accounts.is_empty());
    assert!(report.skipped_history.is_empty());

    // The rotating session keeps working; it now holds the new key.
    assert_eq!(f.admin.key_version(), 2);
    let revealed = f
        .vault
        .reveal_secret(&f.admin, first.id)
        .expect("reveal after rotation should succeed");
    assert_eq!(revealed.expose_secret(), "alpha");

    // Only the wrapped key is rewritten; the sealed secret is untouched.
    let (after, _) = f.vault.get_account(&f.admin, first.id).expect("get");
    assert_eq!(after.pass, first.pass);
    assert_ne!(after.key, first.key);
    assert_ne!(after.key_hash, first.key_hash);

    let report = f
        .vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(ROTATED), &passphrase(MASTER))
        .expect("rotation back should succeed");
    assert_eq!(report.new_version, 3);

    let (back, _) = f.vault.get_account(&f.admin, second.id).expect("get");
    assert_eq!(back.pass, second.pass);
    let revealed = f
        .vault
        .reveal_secret(&f.admin, second.id)
        .expect("reveal should succeed");
    assert_eq!(revealed.expose_secret(), "beta");
}

#[test]
fn test_rotation_requires_admin_and_current_passphrase() {
    let mut f = fixture();
    let group = f.vault.create_group(&f.admin, "ops").expect("group");
    f.vault
        .create_user(
            &f.admin,
            NewUser::new("alice", group.id).with_profile(ProfilePermissions::all()),
        )
        .expect("create alice");
    let mut alice = f
        .vault
        .login("alice", &passphrase(MASTER))
        .expect("alice login should succeed");

    let err = f
        .vault
        .rotate_master_passphrase(&mut alice, &passphrase(MASTER), &passphrase(ROTATED))
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied));

    let err = f
        .vault
        .rotate_master_passphrase(&mut f.admin, &passphrase("not it"), &passphrase(ROTATED))
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidCredentials));
}

#[test]
fn test_rotation_invalidates_old_sessions_and_passphrase() {
    let mut f = fixture();
    let group = f.vault.create_group(&f.admin, "ops").expect("group");
    f.vault
        .create_user(
            &f.admin,
            NewUser::new("alice", group.id).with_profile(ProfilePermissions::all()),
        )
        .expect("create alice");
    let stale_session = f
        .vault
        .login("alice", &passphrase(MASTER))
        .expect("alice login should succeed");

    let account = f
        .vault
        .create_account(&stale_session, NewAccount::new("hers"), &passphrase("pw"))
        .expect("create should succeed");

    f.vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(MASTER), &passphrase(ROTATED))
        .expect("rotation should succeed");

    // A session opened before the rotation holds the superseded key.
    let err = f
        .vault
        .reveal_secret(&stale_session, account.id)
        .unwrap_err();
    assert!(matches!(err, VaultError::NeedsKeyMigration));

    let err = f.vault.login("alice", &passphrase(MASTER)).unwrap_err();
    assert!(matches!(err, VaultError::InvalidCredentials));

    let fresh = f
        .vault
        .login("alice", &passphrase(ROTATED))
        .expect("login with new passphrase should succeed");
    let revealed = f
        .vault
        .reveal_secret(&fresh, account.id)
        .expect("reveal should succeed");
    assert_eq!(revealed.expose_secret(), "pw");
}

#[test]
fn test_rotation_rewraps_history_snapshots() {
    let mut f = fixture();
    let account = f
        .vault
        .create_account(&f.admin, NewAccount::new("svc"), &passphrase("first"))
        .expect("create should succeed");
    f.vault
        .update_secret(&f.admin, account.id, &passphrase("second"), account.date_edit)
        .expect("update secret should succeed");

    let report = f
        .vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(MASTER), &passphrase(ROTATED))
        .expect("rotation should succeed");
    assert_eq!(report.history_rewrapped, 1);
    assert!(report.skipped_history.is_empty());

    let history = f
        .vault
        .list_history(&f.admin, account.id)
        .expect("list history should succeed");
    assert_eq!(history.len(), 1);
    let old_secret = f
        .vault
        .reveal_history_secret(&f.admin, history[0].id)
        .expect("history reveal after rotation should succeed");
    assert_eq!(old_secret.expose_secret(), "first");
}

#[test]
fn test_rotation_skips_stale_rows_and_update_recovers_them() {
    let mut f = fixture();
    let stale = f
        .vault
        .create_account(&f.admin, NewAccount::new("stale"), &passphrase("old"))
        .expect("create should succeed");
    let current = f
        .vault
        .create_account(&f.admin, NewAccount::new("current"), &passphrase("ok"))
        .expect("create should succeed");

    // Damage one row's fingerprint from outside, as a crashed partial
    // migration would leave it.
    {
        let conn = rusqlite::Connection::open(&f.db_path).expect("open raw connection");
        conn.execute(
            "UPDATE accounts SET key_hash = 'stale-fingerprint' WHERE id = ?1",
            [stale.id.to_string()],
        )
        .expect("raw update should succeed");
    }

    let report = f
        .vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(MASTER), &passphrase(ROTATED))
        .expect("rotation should succeed");
    assert_eq!(report.accounts_rewrapped, 1);
    assert_eq!(report.skipped_accounts, vec![stale.id]);

    let err = f.vault.reveal_secret(&f.admin, stale.id).unwrap_err();
    assert!(matches!(err, VaultError::NeedsKeyMigration));
    let ok = f
        .vault
        .reveal_secret(&f.admin, current.id)
        .expect("rewrapped row should open");
    assert_eq!(ok.expose_secret(), "ok");

    // Rewriting the secret seals it under the live key state.
    f.vault
        .update_secret(&f.admin, stale.id, &passphrase("renewed"), stale.date_edit)
        .expect("update secret should succeed");
    let recovered = f
        .vault
        .reveal_secret(&f.admin, stale.id)
        .expect("reveal should succeed");
    assert_eq!(recovered.expose_secret(), "renewed");
}

#[test]
fn test_rotation_resets_other_users_key_stamp() {
    let mut f = fixture();
    let group = f.vault.create_group(&f.admin, "ops").expect("group");
    f.vault
        .create_user(
            &f.admin,
            NewUser::new("alice", group.id).with_profile(ProfilePermissions::all()),
        )
        .expect("create alice");
    f.vault
        .login("alice", &passphrase(MASTER))
        .expect("alice login should succeed");

    f.vault
        .rotate_master_passphrase(&mut f.admin, &passphrase(MASTER), &passphrase(ROTATED))
        .expect("rotation should succeed");

    let stamp = |users: &[covault_core::storage::types::User], login: &str| {
        users
            .iter()
            .find(|u| u.login == login)
            .map(|u| u.last_key_update)
            .expect("user should exist")
    };

    let users = f.vault.list_users(&f.admin).expect("list users");
    assert_eq!(stamp(&users, "root"), 2);
    assert_eq!(stamp(&users, "alice"), 0);

    // Presenting the new passphrase is what brings a user forward.
    f.vault
        .login("alice", &passphrase(ROTATED))
        .expect("re-login should succeed");
    let users = f.vault.list_users(&f.admin).expect("list users");
    assert_eq!(stamp(&users, "alice"), 2);
}
