//! Integration tests for the commands that talk to the gallery server.


use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{bytes_response, can_bind_localhost, log_in, packed, sequence_json, temp_home};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/sequences"))
        .and(query_param("page", "1"))
        .and(query_param("sort", "popular"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sequences": [
                sequence_json("a1", "Sunrise", &["f0", "f1"]),
                sequence_json("b2", "Rain", &["g0"]),
                json!({"id": "c3", "frames": ["h0"]}),
            ],
            "total_page_count": 2,
            "next_page_exists": true,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_browse_lists_page() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    mount_page(&server).await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .arg("browse")
        .assert()
        .success()
        .stdout(predicate::str::contains("popular - page 1/2"))
        .stdout(predicate::str::contains("a1  Sunrise by pixel (2 frames)"))
        .stdout(predicate::str::contains("b2  Rain by pixel (1 frames)"))
        .stdout(predicate::str::contains("c3  untitled by unknown (1 frames)"));
}

#[tokio::test]
async fn test_browse_fails_after_retry_budget() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sequences"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .arg("browse")
        .assert()
        .failure()
        .stderr(predicate::str::contains("after 2 attempts"));
}

#[test]
fn test_browse_favorites_requires_login() {
    let home = temp_home();

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .args(["browse", "--sort", "favorites"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs a login"));
}

#[tokio::test]
async fn test_play_exports_fastload_frames() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let export = home.path().join("frames");
    let server = MockServer::start().await;
    mount_page(&server).await;

    let mut payload = packed(2, 2, [255, 0, 0]);
    payload.extend(packed(2, 2, [0, 0, 255]));
    Mock::given(method("GET"))
        .and(path("/images/a1/f0"))
        .and(query_param("fastload", "true"))
        .respond_with(bytes_response(payload))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .args(["play", "--index", "0", "--export"])
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Playing Sunrise by pixel"))
        .stdout(predicate::str::contains("Downloaded 2/2 frames of a1"))
        .stdout(predicate::str::contains("Wrote 2 frames"));

    assert!(export.join("frame-000.png").exists());
    assert!(export.join("frame-001.png").exists());
    let bytes = fs::read(export.join("frame-000.png")).unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_play_rejects_missing_index() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    mount_page(&server).await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .args(["play", "--index", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No sequence at index 5"));
}

#[tokio::test]
async fn test_favorite_falls_back_to_local_list() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    log_in(&home);
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sequence/a1/mark_favorite"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .args(["favorite", "a1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved favorite a1 locally"));

    let list = fs::read_to_string(home.path().join("favorite_animations.json")).unwrap();
    assert!(list.contains("a1"));
}

#[test]
fn test_favorite_requires_login() {
    let home = temp_home();

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .args(["favorite", "a1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Log in first"));
}

#[tokio::test]
async fn test_logout_clears_credential() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    log_in(&home);
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/logout_badge"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out."));

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in:  no"))
        .stdout(predicate::str::contains("Badge UUID: uuid-1"));
}

#[test]
fn test_status_shows_masked_token() {
    let home = temp_home();
    log_in(&home);

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in:  yes (token-...)"))
        .stdout(predicate::str::contains("token-1234567890").not());
}

#[test]
fn test_website_prints_configured_url() {
    let home = temp_home();

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .args(["website", "--no-open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://pixelbadge.xyz"));
}

#[tokio::test]
async fn test_play_names_untitled_sequence() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    mount_page(&server).await;
    Mock::given(method("GET"))
        .and(path("/images/c3/h0"))
        .respond_with(bytes_response(packed(1, 1, [8, 8, 8])))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("pixelbadge")
        .env("PIXELBADGE_HOME", home.path())
        .env("PIXELBADGE_BASE_URL", server.uri())
        .args(["play", "--index", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Playing untitled by unknown (1 frames)"))
        .stdout(predicate::str::contains("Downloaded 1/1 frames of c3"));
}
