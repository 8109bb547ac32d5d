//! End-to-end CLI tests for the reelfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Builds the command with an isolated config location.
fn reelfetch(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("reelfetch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG")
        .write_stdin("");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    reelfetch(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download every .mp4"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    reelfetch(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelfetch"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    reelfetch(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that an out-of-range concurrency is rejected by the parser.
#[test]
fn test_binary_concurrency_out_of_range() {
    let home = TempDir::new().unwrap();
    reelfetch(&home)
        .args(["-c", "32", "https://example.invalid/"])
        .assert()
        .code(2);
}

/// Test that running without any source URL is an error (exit 1).
#[test]
fn test_binary_without_urls_fails() {
    let home = TempDir::new().unwrap();
    reelfetch(&home)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no source URLs"));
}

/// Test that a broken config file is reported (exit 1).
#[test]
fn test_binary_rejects_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "concurrency = 99\n").unwrap();

    reelfetch(&home)
        .arg("--config")
        .arg(&config)
        .arg("https://example.invalid/")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

/// Test a full run against a mock gallery: files land, summary prints, JSON is written.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_downloads_gallery_and_writes_summary() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let html = format!(
        "<div class=\"dropdown-content1\">\
         <a onclick=\"myfunction('{0}/media/big-day-1652393410-9.mp4')\">HD</a>\
         <a onclick=\"myfunction('{0}/media/cover.jpg')\">Cover</a>\
         </div>",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/App/me/trip/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/media/big-day-1652393410-9.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 4_096]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/big-day-1652393410-9.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8; 4_096]))
        .mount(&server)
        .await;

    let page = format!("{}/App/me/trip/", server.uri());
    let summary = out.path().join("summary.json");
    let videos = out.path().join("videos");
    let mut cmd = reelfetch(&home);
    cmd.arg("-o")
        .arg(&videos)
        .arg("--no-progress")
        .arg("--summary-json")
        .arg(&summary)
        .arg(format!("{page};"));

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("FINAL DOWNLOAD SUMMARY"))
        .stdout(predicate::str::contains("Successfully downloaded: 1"))
        .stdout(predicate::str::contains("big day.mp4 (4,096 bytes)"));

    assert_eq!(std::fs::read(videos.join("big day.mp4")).unwrap().len(), 4_096);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["totals"]["found"], 1);
    assert_eq!(json["totals"]["downloaded"], 1);
}

/// Test that source URLs can come from the config file.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_uses_start_urls_from_config() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/App/me/empty/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let config_dir = home.path().join("reelfetch");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "start_urls = \"{}/App/me/empty/\"\noutput_dir = \"{}\"\n",
            server.uri(),
            out.path().join("media").display()
        ),
    )
    .unwrap();

    let mut cmd = reelfetch(&home);
    cmd.arg("-q");
    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("Total URLs found across all galleries: 0"));
    assert!(out.path().join("media").is_dir());
}
