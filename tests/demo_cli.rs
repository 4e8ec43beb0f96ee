use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// The demo binary, isolated from the caller's environment and user config.
fn fsss(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fsss").expect("Failed to find fsss binary");
    cmd.env_clear()
        .env("NO_COLOR", "1")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .current_dir(home.path());
    cmd
}

#[test]
fn test_serve_defaults() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .arg("serve")
        .assert()
        .success()
        .stdout(predicate::str::contains("Serving on http://localhost:3000"));
}

#[test]
fn test_serve_flags_and_env() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .args(["serve", "-p", "8080", "--host", "0.0.0.0", "-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Serving on http://0.0.0.0:8080"))
        .stdout(predicate::str::contains("Request logging enabled"));

    fsss(&home)
        .arg("serve")
        .env("FSSS_SERVE_PORT", "9090")
        .assert()
        .success()
        .stdout(predicate::str::contains(":9090"));
}

#[test]
fn test_serve_rejects_out_of_range_port() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .args(["serve", "--port", "70000"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("port"))
        .stderr(predicate::str::contains("Usage: fsss serve"));
}

#[test]
fn test_serve_help() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-p, --port <port>"))
        .stdout(predicate::str::contains("env: FSSS_SERVE_PORT"));
}

#[test]
fn test_config_set_then_get() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .args(["config", "set", "editor.theme", "dark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set editor.theme = dark"));

    let saved = fs::read_to_string(home.path().join("fsss.json")).unwrap();
    assert!(saved.contains("\"theme\": \"dark\""));

    fsss(&home)
        .args(["config", "get", "editor.theme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("editor.theme = dark"));
}

#[test]
fn test_remote_push_requires_token() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .args(["remote", "origin", "push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not authenticated"));

    fsss(&home)
        .args(["remote", "origin", "push", "feature", "-f"])
        .env("FSSS_TOKEN", "secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pushing feature to origin (forced)"));
}

#[test]
fn test_unknown_command_lists_available() {
    let home = TempDir::new().unwrap();
    fsss(&home)
        .arg("deploy")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown command: 'deploy'"))
        .stdout(predicate::str::contains("config/"))
        .stdout(predicate::str::contains("Start the development server"));
}

// `dirs` only honours XDG_CONFIG_HOME on Linux.
#[cfg(target_os = "linux")]
#[test]
fn test_user_config_layer() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join(".config").join("fsss");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[serve]\nport = 4321\n").unwrap();

    fsss(&home)
        .arg("serve")
        .assert()
        .success()
        .stdout(predicate::str::contains(":4321"));
}
