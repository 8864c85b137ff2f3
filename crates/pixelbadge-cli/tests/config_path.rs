use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_config_path_uses_home_env() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().join("config.toml");

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn test_home_flag_overrides_env() {
    let env_dir = TempDir::new().unwrap();
    let flag_dir = TempDir::new().unwrap();
    let expected = flag_dir.path().join("config.toml");

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", env_dir.path())
        .arg("--home")
        .arg(flag_dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn test_config_init_writes_template_once() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("# Gallery API server."));

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_set_base_url_keeps_other_values() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "fastload = false\n").unwrap();

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", dir.path())
        .args(["config", "set-base-url", "https://badge.example.org"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://badge.example.org"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains(r#"base_url = "https://badge.example.org""#));
    assert!(contents.contains("fastload = false"));
}

#[test]
fn test_log_file_flag_creates_log() {
    let dir = TempDir::new().unwrap();

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", dir.path())
        .args(["--log-file", "config", "path"])
        .assert()
        .success();

    assert!(dir.path().join("logs").join("pixelbadge.log").exists());
}
