//! Integration tests for frame download and partial playback.


use std::sync::Arc;
use std::time::Duration;

use fixtures::{bytes_response, can_bind_localhost, fast_config, join, open_session, packed, wait_until};
use pixelbadge_core::connectivity::{AlwaysOnline, ConnectivityFlag};
use pixelbadge_core::frames::FrameDownloader;
use pixelbadge_core::sequence::Sequence;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sequence(id: &str, frame_count: usize) -> Sequence {
    Sequence {
        id: id.to_string(),
        title: None,
        username: None,
        frames: (0..frame_count).map(|i| format!("f{i}")).collect(),
        frame_time_ms: Some(100),
        favorited_by_current_user: false,
        thumbnail: None,
    }
}

fn player(server: &MockServer, fastload: bool) -> (FrameDownloader, tempfile::TempDir) {
    let mut config = fast_config(&server.uri());
    config.fastload = fastload;
    let (session, home) = open_session(config, Arc::new(AlwaysOnline));
    (FrameDownloader::new(session), home)
}

#[tokio::test]
async fn test_fastload_short_payload_decodes_what_fits() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    // 4x2 frames are 26 bytes; 52 bytes hold two of the three declared.
    let mut payload = packed(4, 2, [1, 1, 1]);
    payload.extend(packed(4, 2, [2, 2, 2]));
    assert_eq!(payload.len(), 52);
    Mock::given(method("GET"))
        .and(path("/images/s/f0"))
        .and(query_param("fallback", "true"))
        .and(query_param("fastload", "true"))
        .respond_with(bytes_response(payload))
        .expect(1)
        .mount(&server)
        .await;

    let (player, _home) = player(&server, true);
    join(player.start_playback(sequence("s", 3)).unwrap()).await;

    let progress = player.progress().unwrap();
    assert_eq!((progress.downloaded, progress.total), (2, 3));
    assert!(!progress.is_complete());
    let cached = player.cached_frames();
    assert!(cached[0].is_some());
    assert!(cached[1].is_some());
    assert!(cached[2].is_none());

    // Fastload never re-requests the frames it did not deliver.
    assert!(player.tick(0).is_none());

    // Cursor on the missing frame falls back to the last cached one.
    player.advance(100);
    player.advance(100);
    let frame = player.current_frame().unwrap();
    assert_eq!(frame.index, 1);
    assert_eq!(frame.packed().unwrap().pixel(3, 1), Some([2, 2, 2]));

    // Wraps back to frame 0.
    player.advance(100);
    assert_eq!(player.current_frame().unwrap().index, 0);
}

#[tokio::test]
async fn test_legacy_mode_downloads_frames_in_order() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    for i in 0..3u8 {
        Mock::given(method("GET"))
            .and(path(format!("/images/s/f{i}")))
            .and(query_param("fallback", "true"))
            .and(query_param_is_missing("fastload"))
            .respond_with(bytes_response(packed(1, 1, [i, i, i])))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (player, _home) = player(&server, false);
    player.start_playback(sequence("s", 3));

    wait_until(|| player.progress().is_some_and(|p| p.is_complete())).await;

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/images/s/f0", "/images/s/f1", "/images/s/f2"]);
    assert!(player.cached_frames().iter().all(Option::is_some));
}

#[tokio::test]
async fn test_switching_sequence_discards_stale_download() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/a/f0"))
        .respond_with(bytes_response(packed(1, 1, [9, 9, 9])).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/a/f1"))
        .respond_with(bytes_response(packed(1, 1, [9, 9, 9])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/b/f0"))
        .respond_with(bytes_response(packed(1, 1, [5, 5, 5])))
        .expect(1)
        .mount(&server)
        .await;

    let (player, _home) = player(&server, false);
    player.start_playback(sequence("a", 2));
    tokio::time::sleep(Duration::from_millis(100)).await;

    player.stop();
    assert!(player.progress().is_none());
    player.start_playback(sequence("b", 1));

    wait_until(|| player.progress().is_some_and(|p| p.is_complete())).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(player.current_sequence().unwrap().id, "b");
    let frame = player.current_frame().unwrap();
    assert_eq!(frame.packed().unwrap().pixel(0, 0), Some([5, 5, 5]));
}

#[tokio::test]
async fn test_tick_resumes_after_exhausted_budget() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/s/f0"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/s/f0"))
        .respond_with(bytes_response(packed(1, 1, [7, 7, 7])))
        .expect(1)
        .mount(&server)
        .await;

    let (player, _home) = player(&server, true);
    join(player.start_playback(sequence("s", 1)).unwrap()).await;

    assert_eq!(player.progress().unwrap().downloaded, 0);
    assert!(!player.is_downloading());
    assert!(player.current_frame().is_none());

    let resumed = player.tick(16).expect("resume download");
    join(resumed).await;

    assert!(player.progress().unwrap().is_complete());
    assert!(player.current_frame().is_some());
}

#[tokio::test]
async fn test_stop_releases_cache() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/s/f0"))
        .respond_with(bytes_response(packed(1, 1, [3, 3, 3])))
        .mount(&server)
        .await;

    let (player, _home) = player(&server, true);
    join(player.start_playback(sequence("s", 1)).unwrap()).await;
    assert!(player.current_frame().is_some());

    player.stop();

    assert!(player.current_frame().is_none());
    assert!(player.cached_frames().is_empty());
    assert!(player.tick(16).is_none());
}

fn player_with_link(server: &MockServer, link: &ConnectivityFlag) -> (FrameDownloader, tempfile::TempDir) {
    let mut config = fast_config(&server.uri());
    config.fastload = false;
    let (session, home) = open_session(config, Arc::new(link.clone()));
    (FrameDownloader::new(session), home)
}

async fn requests_for(server: &MockServer, frame_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == frame_path)
        .count()
}

#[tokio::test]
async fn test_offline_download_reports_blocked() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/s/f0"))
        .respond_with(bytes_response(packed(1, 1, [4, 4, 4])))
        .expect(1)
        .mount(&server)
        .await;

    let link = ConnectivityFlag::new(false);
    let (player, _home) = player_with_link(&server, &link);
    let handle = player.start_playback(sequence("s", 1)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let progress = player.progress().unwrap();
    assert!(progress.blocked);
    assert_eq!(progress.downloaded, 0);
    assert!(player.is_downloading());
    assert!(server.received_requests().await.unwrap().is_empty());

    link.set(true);
    join(handle).await;

    let progress = player.progress().unwrap();
    assert!(!progress.blocked);
    assert!(progress.is_complete());
}

#[tokio::test]
async fn test_resume_continues_from_first_missing_frame() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    for i in [0u8, 1, 2, 4] {
        Mock::given(method("GET"))
            .and(path(format!("/images/s/f{i}")))
            .respond_with(bytes_response(packed(1, 1, [i, i, i])))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/images/s/f3"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/s/f3"))
        .respond_with(bytes_response(packed(1, 1, [3, 3, 3])))
        .expect(1)
        .mount(&server)
        .await;

    let link = ConnectivityFlag::new(true);
    let (player, _home) = player_with_link(&server, &link);
    player.start_playback(sequence("s", 5));

    // Frame 3 uses up its budget.
    tokio::time::timeout(Duration::from_secs(5), async {
        while requests_for(&server, "/images/s/f3").await < 2 || player.is_downloading() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("frame 3 budget exhausted");
    assert_eq!(player.progress().unwrap().downloaded, 3);

    link.set(false);
    let resumed = player.tick(16).expect("resume download");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let progress = player.progress().unwrap();
    assert!(progress.blocked);
    assert_eq!(progress.downloaded, 3);
    assert_eq!(requests_for(&server, "/images/s/f3").await, 2);

    link.set(true);
    join(resumed).await;
    wait_until(|| player.progress().is_some_and(|p| p.is_complete())).await;

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "/images/s/f0",
            "/images/s/f1",
            "/images/s/f2",
            "/images/s/f3",
            "/images/s/f3",
            "/images/s/f3",
            "/images/s/f4",
        ]
    );
}
