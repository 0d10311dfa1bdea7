#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn empty_config() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "").expect("write config");
    (dir, path)
}

#[test]
fn help_lists_subcommands() {
    let output = cargo_bin_cmd!("osn-sample")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("run"));
    assert!(text.contains("config"));
}

#[test]
fn config_path_echoes_explicit_file() {
    let (_dir, config) = empty_config();
    let output = cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(text.trim(), config.display().to_string());
}

#[test]
fn config_show_hides_token_values() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[api]\ntokens = [\"secret-one\", \"secret-two\"]\n").expect("write");

    let output = cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(!text.contains("secret-one"));
    let json: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(json["tokens"], 2);
    assert_eq!(json["loaded"], true);
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["config", "path"])
        .assert()
        .failure();
}

#[test]
fn run_without_tokens_fails_before_writing() {
    let (dir, config) = empty_config();
    let out = dir.path().join("samples.txt");
    let output = cargo_bin_cmd!("osn-sample")
        .env_remove("OSN_SAMPLE_TOKENS")
        .arg("--config")
        .arg(&config)
        .args(["run", "--sampler", "bfs", "--root", "1", "--output"])
        .arg(&out)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("no access tokens"), "stderr: {text}");
    assert!(!out.exists());
}

#[test]
fn unknown_sampler_is_rejected() {
    let (_dir, config) = empty_config();
    cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(&config)
        .args(["run", "--sampler", "dfs", "--root", "1", "--tokens", "t"])
        .assert()
        .failure();
}

#[test]
fn range_end_with_walk_sampler_is_rejected() {
    let (dir, config) = empty_config();
    cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(&config)
        .args(["run", "--sampler", "rw", "--root", "1", "--end", "9"])
        .args(["--tokens", "t", "--base-url", "http://127.0.0.1:9/"])
        .arg("--output")
        .arg(dir.path().join("samples.txt"))
        .assert()
        .failure();
}

#[test]
fn unreachable_upstream_ends_bfs_with_empty_output() {
    let (dir, config) = empty_config();
    let out = dir.path().join("samples.txt");
    let output = cargo_bin_cmd!("osn-sample")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "run", "--sampler", "bfs", "--root", "1"])
        .args(["--tokens", "t", "--base-url", "http://127.0.0.1:9/"])
        .args(["--timeout-secs", "2", "--max-transient-retries", "0"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json summary");
    assert_eq!(json["report"]["sampler"], "bfs");
    assert_eq!(json["report"]["recorded"], 0);
    assert_eq!(json["report"]["final_counter"], 1);
    assert_eq!(json["client"]["transient_give_ups"], 1);
    assert_eq!(fs::read_to_string(&out).expect("output file"), "");
}
