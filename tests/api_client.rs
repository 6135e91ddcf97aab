//! Integration tests for the Miniflux client against a mocked server.
//!
//! Covers the calls the TUI chains together: bulk mark-as-read, feed and
//! category editing, and the OPML round trip through a local file.

use fluxread::api::{
    ApiError, EntryQuery, EntrySource, EntryStatus, FeedModification, MinifluxClient,
};
use fluxread::opml;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Miniflux</title></head>
  <body>
    <outline text="Tech">
      <outline text="Rust Blog" xmlUrl="https://blog.rust-lang.org/feed.xml"/>
    </outline>
  </body>
</opml>"#;

fn client(server: &MockServer) -> MinifluxClient {
    MinifluxClient::new(
        &server.uri(),
        &SecretString::from("integration-token"),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("fluxread-{}-{nanos}-{name}", std::process::id()))
}

#[tokio::test]
async fn test_bulk_mark_endpoints() {
    let server = MockServer::start().await;
    for p in [
        "/v1/feeds/7/mark-all-as-read",
        "/v1/categories/3/mark-all-as-read",
        "/v1/users/1/mark-all-as-read",
    ] {
        Mock::given(method("PUT"))
            .and(path(p))
            .and(header("X-Auth-Token", "integration-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let c = client(&server);
    c.mark_feed_as_read(7).await.unwrap();
    c.mark_category_as_read(3).await.unwrap();
    c.mark_all_as_read(1).await.unwrap();
}

#[tokio::test]
async fn test_mark_ids_read_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/entries"))
        .and(body_json(serde_json::json!({"entry_ids": [1, 2, 3], "status": "read"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .update_entries_status(&[1, 2, 3], EntryStatus::Read)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_starred_source_adds_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .and(query_param("starred", "true"))
        .and(query_param("limit", "50"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0, "entries": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .get_entries(
            EntrySource::Starred,
            EntryQuery {
                limit: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.entries.is_empty());
}

#[tokio::test]
async fn test_rename_feed_and_category() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/7"))
        .and(body_json(serde_json::json!({"title": "Renamed"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 7, "title": "Renamed", "category": {"id": 3, "title": "Tech"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/categories/3"))
        .and(body_json(serde_json::json!({"title": "Programming"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 3, "title": "Programming"})),
        )
        .mount(&server)
        .await;

    let c = client(&server);
    let feed = c
        .update_feed(
            7,
            &FeedModification {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(feed.title, "Renamed");
    assert_eq!(feed.category.id, 3);

    let category = c.update_category(3, "Programming").await.unwrap();
    assert_eq!(category.title, "Programming");
}

#[tokio::test]
async fn test_delete_missing_feed_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/feeds/99"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"error_message": "Feed not found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).delete_feed(99).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
    assert!(!err.is_unauthorized());
}

#[tokio::test]
async fn test_opml_export_to_file_and_reimport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/export"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OPML))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/import"))
        .and(header("content-type", "application/xml"))
        .and(body_string_contains("Rust Blog"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"message": "Feeds imported successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server);
    let exported = c.export_opml().await.unwrap();
    let file = temp_path("subscriptions.opml");
    opml::write_export(&file, &exported).unwrap();

    let (content, summary) = opml::read_import_file(&file).await.unwrap();
    assert_eq!(summary.feeds, 1);
    assert_eq!(summary.folders, 1);
    c.import_opml(content).await.unwrap();

    let _ = std::fs::remove_file(&file);
}

#[tokio::test]
async fn test_import_rejects_non_opml_file() {
    let file = temp_path("notes.xml");
    std::fs::write(&file, "<rss><channel/></rss>").unwrap();

    let err = opml::read_import_file(&file).await.unwrap_err();
    assert!(matches!(err, opml::OpmlError::NotOpml(ref root) if root == "rss"));

    let _ = std::fs::remove_file(&file);
}
