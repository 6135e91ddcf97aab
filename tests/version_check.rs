//! Integration tests for the update check against a mocked metadata URL.

use chrono::{TimeZone, Utc};
use fluxread::version::{BuildInfo, UpdateDecision, VersionChecker, VersionError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn local_build() -> BuildInfo {
    BuildInfo {
        git_hash: "abc1234".into(),
        git_date: "2024-05-01T10:00:00Z".into(),
    }
}

fn checker(server: &MockServer) -> VersionChecker {
    VersionChecker::new(
        Some(format!("{}/version.json", server.uri())),
        local_build(),
        false,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_newer_remote_build_is_an_update() {
    let server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .and(query_param("_", now.timestamp_millis().to_string()))
        .and(header("cache-control", "no-store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "gitHash": "def5678",
            "gitDate": "2024-05-20T08:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let decision = checker(&server).check(now).await.unwrap();
    assert_eq!(decision, UpdateDecision::ByDate(true));
    assert!(decision.has_update());
}

#[tokio::test]
async fn test_same_build_is_not_an_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "gitHash": "abc1234",
            "gitDate": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let decision = checker(&server).check(Utc::now()).await.unwrap();
    assert!(!decision.has_update());
}

#[tokio::test]
async fn test_missing_metadata_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = checker(&server).check(Utc::now()).await.unwrap_err();
    assert!(matches!(err, VersionError::Status(404)));
}

#[tokio::test]
async fn test_garbage_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = checker(&server).check(Utc::now()).await.unwrap_err();
    assert!(matches!(err, VersionError::Decode(_)));
}

#[tokio::test]
async fn test_oversized_chunked_body_is_rejected() {
    // No Content-Length, so only the streamed read can catch the size.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await;
        let chunk = vec![b' '; 16 * 1024];
        for _ in 0..8 {
            let header = format!("{:x}\r\n", chunk.len());
            if socket.write_all(header.as_bytes()).await.is_err()
                || socket.write_all(&chunk).await.is_err()
                || socket.write_all(b"\r\n").await.is_err()
            {
                return;
            }
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });

    let checker = VersionChecker::new(
        Some(format!("http://{addr}/version.json")),
        local_build(),
        false,
        Duration::from_secs(5),
    )
    .unwrap();
    let err = checker.check(Utc::now()).await.unwrap_err();
    assert!(matches!(err, VersionError::TooLarge));
}
