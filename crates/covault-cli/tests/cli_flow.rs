//! End-to-end flows through the `covault` binary: vault lifecycle,
//! account CRUD, authorization failures with their exit codes, history
//! restore and master passphrase rotation.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tempfile::{tempdir, TempDir};

const MASTER: &str = "orbit-hamster-battery";
const ROTATED: &str = "granite-otter-lantern";

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_covault"))
}

/// Isolated home for one test: private XDG dirs and a vault path, so
/// nothing leaks between tests or from the developer's machine.
struct TestHome {
    dir: TempDir,
}

impl TestHome {
    fn new() -> Self {
        let dir = tempdir().expect("temp dir should be available");
        std::fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        std::fs::create_dir_all(dir.path().join("data")).expect("create data dir");
        Self { dir }
    }

    fn config_home(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    fn data_home(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn vault_path(&self) -> PathBuf {
        self.data_home().join("team.vault")
    }

    fn covault(&self) -> Command {
        let mut cmd = Command::new(bin());
        cmd.env("XDG_CONFIG_HOME", self.config_home())
            .env("XDG_DATA_HOME", self.data_home())
            .env("HOME", self.dir.path())
            .env_remove("COVAULT_PATH")
            .env_remove("COVAULT_USER")
            .env_remove("COVAULT_NEW_PASSPHRASE")
            .env("COVAULT_PASSPHRASE", MASTER);
        cmd
    }

    /// A command against the initialized vault, acting as `user`.
    fn as_user(&self, user: &str) -> Command {
        let mut cmd = self.covault();
        cmd.arg("--vault").arg(self.vault_path());
        cmd.args(["--user", user]);
        cmd
    }
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: stdout={}, stderr={}",
        what,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected JSON on stdout: {} (stdout={})",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn init_vault(home: &TestHome) {
    let mut cmd = home.covault();
    cmd.arg("init")
        .arg(home.vault_path())
        .args(["--admin", "root", "--no-config"]);
    let output = cmd.output().expect("run init");
    assert_success(&output, "init");
}

/// Run `add` with the secret piped on stdin; returns the new account id.
fn add_account(home: &TestHome, user: &str, name: &str, secret: &str, extra: &[&str]) -> String {
    let mut cmd = home.as_user(user);
    cmd.args(["add", name, "--json"])
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let child = cmd.spawn().expect("spawn add");
    child
        .stdin
        .as_ref()
        .expect("stdin")
        .write_all(format!("{}\n", secret).as_bytes())
        .expect("write secret");
    let output = child.wait_with_output().expect("wait add");
    assert_success(&output, "add");
    stdout_json(&output)
        .get("id")
        .and_then(|v| v.as_str())
        .expect("account id in add output")
        .to_string()
}

#[test]
fn test_init_add_list_show_pass_rm_flow() {
    let home = TestHome::new();
    init_vault(&home);

    let id = add_account(
        &home,
        "root",
        "web-server",
        "hunter2-secret",
        &["--login", "svc-web", "--notes", "primary credentials"],
    );

    let output = home
        .as_user("root")
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert_success(&output, "list");
    let listed = stdout_json(&output);
    let array = listed.as_array().expect("list output array");
    assert_eq!(array.len(), 1);
    assert_eq!(array[0].get("id").and_then(|v| v.as_str()), Some(id.as_str()));
    assert_eq!(
        array[0].get("name").and_then(|v| v.as_str()),
        Some("web-server")
    );

    let output = home
        .as_user("root")
        .args(["show", &id, "--json"])
        .output()
        .expect("run show");
    assert_success(&output, "show");
    let shown = stdout_json(&output);
    assert_eq!(
        shown.get("login").and_then(|v| v.as_str()),
        Some("svc-web")
    );
    assert_eq!(
        shown
            .get("acl")
            .and_then(|acl| acl.get("can_edit"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );

    let output = home
        .as_user("root")
        .args(["pass", &id])
        .output()
        .expect("run pass");
    assert_success(&output, "pass");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "hunter2-secret"
    );

    let output = home
        .as_user("root")
        .args(["rm", &id, "--yes"])
        .output()
        .expect("run rm");
    assert_success(&output, "rm");

    // Gone means indistinguishable from never having existed.
    let output = home
        .as_user("root")
        .args(["show", &id])
        .output()
        .expect("run show");
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn test_wrong_passphrase_and_unknown_login_fail_alike() {
    let home = TestHome::new();
    init_vault(&home);

    let output = home
        .as_user("root")
        .args(["list", "--json"])
        .env("COVAULT_PASSPHRASE", "definitely-not-it")
        .output()
        .expect("run list");
    assert_eq!(output.status.code(), Some(5));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Incorrect passphrase."),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    // An unknown login gets the same refusal, not a user-enumeration
    // oracle.
    let output = home
        .as_user("ghost")
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert_eq!(output.status.code(), Some(5));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Incorrect passphrase."),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_missing_vault_points_at_init() {
    let home = TestHome::new();

    let mut cmd = home.covault();
    cmd.arg("--vault")
        .arg(home.data_home().join("nowhere.vault"))
        .args(["--user", "root", "list"]);
    let output = cmd.output().expect("run list");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Vault not found"), "stderr={}", stderr);
    assert!(stderr.contains("covault init"), "stderr={}", stderr);
}

#[test]
fn test_private_account_denied_for_second_user() {
    let home = TestHome::new();
    init_vault(&home);

    let output = home
        .as_user("root")
        .args(["group", "add", "ops"])
        .output()
        .expect("run group add");
    assert_success(&output, "group add");
    let output = home
        .as_user("root")
        .args(["user", "add", "bob", "--group", "ops"])
        .output()
        .expect("run user add");
    assert_success(&output, "user add");

    let id = add_account(&home, "root", "root-only", "keep-out", &["--private"]);

    for subcommand in ["show", "pass"] {
        let output = home
            .as_user("bob")
            .args([subcommand, &id])
            .output()
            .expect("run denied command");
        assert_eq!(
            output.status.code(),
            Some(6),
            "{} should be denied: stderr={}",
            subcommand,
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(String::from_utf8_lossy(&output.stderr).contains("Access denied."));
    }

    let output = home
        .as_user("bob")
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert_success(&output, "list");
    assert_eq!(stdout_json(&output).as_array().map(Vec::len), Some(0));

    // Administration stays admin-only as well.
    let output = home
        .as_user("bob")
        .args(["user", "add", "mallory"])
        .output()
        .expect("run user add");
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn test_conflicting_privacy_flags_rejected() {
    let home = TestHome::new();
    init_vault(&home);

    let mut cmd = home.as_user("root");
    cmd.args(["add", "contradiction", "--private", "--private-group"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let child = cmd.spawn().expect("spawn add");
    child
        .stdin
        .as_ref()
        .expect("stdin")
        .write_all(b"some-secret\n")
        .expect("write secret");
    let output = child.wait_with_output().expect("wait add");
    assert_eq!(output.status.code(), Some(4));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("private"),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_history_captures_and_restores_old_secret() {
    let home = TestHome::new();
    init_vault(&home);
    let id = add_account(&home, "root", "db-server", "first-secret", &[]);

    let mut cmd = home.as_user("root");
    cmd.args(["edit-pass", &id])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let child = cmd.spawn().expect("spawn edit-pass");
    child
        .stdin
        .as_ref()
        .expect("stdin")
        .write_all(b"second-secret\n")
        .expect("write secret");
    let output = child.wait_with_output().expect("wait edit-pass");
    assert_success(&output, "edit-pass");

    let output = home
        .as_user("root")
        .args(["pass", &id])
        .output()
        .expect("run pass");
    assert_success(&output, "pass");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "second-secret"
    );

    let output = home
        .as_user("root")
        .args(["history", "list", &id, "--json"])
        .output()
        .expect("run history list");
    assert_success(&output, "history list");
    let entries = stdout_json(&output);
    let array = entries.as_array().expect("history array");
    assert_eq!(array.len(), 1);
    assert_eq!(
        array[0].get("reason").and_then(|v| v.as_str()),
        Some("modify")
    );
    let entry_id = array[0]
        .get("id")
        .and_then(|v| v.as_str())
        .expect("entry id")
        .to_string();

    let output = home
        .as_user("root")
        .args(["history", "pass", &entry_id])
        .output()
        .expect("run history pass");
    assert_success(&output, "history pass");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "first-secret"
    );

    let output = home
        .as_user("root")
        .args(["history", "restore", &entry_id])
        .output()
        .expect("run history restore");
    assert_success(&output, "history restore");

    let output = home
        .as_user("root")
        .args(["pass", &id])
        .output()
        .expect("run pass");
    assert_success(&output, "pass");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "first-secret"
    );
}

#[test]
fn test_rotate_master_switches_the_passphrase() {
    let home = TestHome::new();
    init_vault(&home);
    let id = add_account(&home, "root", "rotated-svc", "sealed-value", &[]);

    let output = home
        .as_user("root")
        .args(["rotate-master", "--yes", "--json"])
        .env("COVAULT_NEW_PASSPHRASE", ROTATED)
        .output()
        .expect("run rotate-master");
    assert_success(&output, "rotate-master");
    let report = stdout_json(&output);
    assert_eq!(report.get("new_version").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        report.get("accounts_rewrapped").and_then(|v| v.as_u64()),
        Some(1)
    );

    let output = home
        .as_user("root")
        .args(["pass", &id])
        .output()
        .expect("run pass");
    assert_eq!(output.status.code(), Some(5), "old passphrase must fail");

    let output = home
        .as_user("root")
        .args(["pass", &id])
        .env("COVAULT_PASSPHRASE", ROTATED)
        .output()
        .expect("run pass");
    assert_success(&output, "pass with new passphrase");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "sealed-value"
    );
}

#[test]
fn test_init_writes_config_with_default_user() {
    let home = TestHome::new();

    let mut cmd = home.covault();
    cmd.arg("init")
        .arg(home.vault_path())
        .args(["--admin", "root"]);
    let output = cmd.output().expect("run init");
    assert_success(&output, "init");

    let config_path = home.config_home().join("covault").join("config.toml");
    let contents = std::fs::read_to_string(&config_path).expect("read config");
    let value: toml::Value = contents.parse().expect("parse config");
    let expected_path = home.vault_path().to_string_lossy().to_string();
    assert_eq!(
        value
            .get("vault")
            .and_then(|section| section.get("path"))
            .and_then(|v| v.as_str()),
        Some(expected_path.as_str())
    );
    assert_eq!(
        value
            .get("session")
            .and_then(|section| section.get("default_user"))
            .and_then(|v| v.as_str()),
        Some("root")
    );

    // With the config in place, neither --vault nor --user is needed.
    let output = home
        .covault()
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert_success(&output, "list via config");
    assert_eq!(stdout_json(&output).as_array().map(Vec::len), Some(0));
}
