//! Web API APK Tests
//!
//! Integration tests for the upload, list, rename and delete endpoints.

use std::sync::Arc;
use std::time::Duration;

use apkdepot::config::{Config, MediaTypePolicy};
use apkdepot::depot::{Depot, APK_MEDIA_TYPE, MAX_FILENAME_LENGTH};
use apkdepot::web::handlers::AppState;
use apkdepot::web::router::create_router;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Create a test configuration rooted in a temporary directory.
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.uploads_path = dir.path().join("uploads").display().to_string();
    config.storage.metadata_path = dir.path().join("data/apks.json").display().to_string();
    config.storage.max_upload_size_mb = 1;
    config.web.static_path = dir.path().join("public").display().to_string();
    config
}

/// Create a test server over a fresh depot.
async fn create_test_server_with(config: &Config) -> TestServer {
    let depot = Depot::open(&config.storage)
        .await
        .expect("Failed to open depot");
    let app_state = Arc::new(AppState::new(Arc::new(depot)));
    let router = create_router(app_state, config);

    TestServer::new(router).expect("Failed to create test server")
}

async fn create_test_server() -> (TestServer, TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let server = create_test_server_with(&config).await;
    (server, dir, config)
}

/// Build an upload form with the given field name and media type.
fn apk_form(field: &str, content: &[u8], mime: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        field,
        Part::bytes(content.to_vec())
            .file_name("app-release.apk")
            .mime_type(mime),
    )
}

/// Upload an APK and return its stored filename.
async fn upload(server: &TestServer, content: &[u8]) -> String {
    // Stored names have millisecond resolution.
    tokio::time::sleep(Duration::from_millis(2)).await;

    let response = server
        .post("/upload-apk")
        .multipart(apk_form("apk", content, APK_MEDIA_TYPE))
        .await;
    response.assert_status(StatusCode::CREATED);

    response
        .text()
        .strip_prefix("APK uploaded successfully: ")
        .expect("unexpected upload response")
        .to_string()
}

async fn list(server: &TestServer) -> Vec<Value> {
    let response = server.get("/apks").await;
    response.assert_status_ok();
    response.json::<Vec<Value>>()
}

fn filenames(listing: &[Value]) -> Vec<String> {
    listing
        .iter()
        .map(|apk| apk["filename"].as_str().unwrap().to_string())
        .collect()
}

fn metadata(config: &Config) -> Vec<Value> {
    let raw = std::fs::read_to_string(&config.storage.metadata_path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_upload_stores_file_and_entry() {
    let (server, _dir, config) = create_test_server().await;
    let started = chrono::Utc::now().timestamp_millis();

    let filename = upload(&server, b"PK\x03\x04apk-bytes").await;

    assert!(filename.starts_with("apk-"));
    assert!(filename.ends_with(".apk"));
    let millis: i64 = filename
        .trim_start_matches("apk-")
        .trim_end_matches(".apk")
        .parse()
        .unwrap();
    assert!(millis >= started);

    let stored = std::path::Path::new(&config.storage.uploads_path).join(&filename);
    assert_eq!(std::fs::read(stored).unwrap(), b"PK\x03\x04apk-bytes");

    let entries = metadata(&config);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["filename"], filename.as_str());
    assert!(entries[0]["uploadDate"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_list_in_upload_order() {
    let (server, _dir, _config) = create_test_server().await;
    assert!(list(&server).await.is_empty());

    let first = upload(&server, b"one").await;
    let second = upload(&server, b"two").await;

    let listing = list(&server).await;
    assert_eq!(filenames(&listing), vec![first.clone(), second]);
    assert_eq!(listing[0]["url"], format!("/uploads/{}", first));

    let date = listing[0]["uploadDate"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(date).is_ok());
}

#[tokio::test]
async fn test_uploaded_file_is_served() {
    let (server, _dir, _config) = create_test_server().await;
    let filename = upload(&server, b"served-bytes").await;

    let response = server.get(&format!("/uploads/{}", filename)).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"served-bytes");

    let response = server.get("/uploads/absent.apk").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_file() {
    let (server, _dir, config) = create_test_server().await;

    let response = server
        .post("/upload-apk")
        .multipart(MultipartForm::new().add_text("note", "no file here"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["message"], "No file uploaded.");

    let response = server
        .post("/upload-apk")
        .multipart(apk_form("file", b"wrong field", APK_MEDIA_TYPE))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(metadata(&config).is_empty());
}

#[tokio::test]
async fn test_upload_rejects_other_media_types() {
    let (server, _dir, config) = create_test_server().await;

    let response = server
        .post("/upload-apk")
        .multipart(apk_form("apk", b"hello", "text/plain"))
        .await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = response.json::<Value>();
    assert_eq!(
        body["error"]["message"],
        "Invalid file type, only APKs are allowed!"
    );

    assert!(metadata(&config).is_empty());
    let blobs = std::fs::read_dir(&config.storage.uploads_path).unwrap().count();
    assert_eq!(blobs, 0);
}

#[tokio::test]
async fn test_permissive_policy_accepts_other_media_types() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.storage.media_type_policy = MediaTypePolicy::Permissive;
    let server = create_test_server_with(&config).await;

    let response = server
        .post("/upload-apk")
        .multipart(apk_form("apk", b"hello", "application/octet-stream"))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(list(&server).await.len(), 1);
}

#[tokio::test]
async fn test_upload_too_large() {
    let (server, _dir, config) = create_test_server().await;
    let content = vec![0u8; 1024 * 1024 + 1];

    let response = server
        .post("/upload-apk")
        .multipart(apk_form("apk", &content, APK_MEDIA_TYPE))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

    assert!(metadata(&config).is_empty());
    let blobs = std::fs::read_dir(&config.storage.uploads_path).unwrap().count();
    assert_eq!(blobs, 0);
}

#[tokio::test]
async fn test_rename_appends_extension() {
    let (server, _dir, config) = create_test_server().await;
    let filename = upload(&server, b"rename-me").await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": filename, "newFilename": "My App" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "APK renamed successfully to My App.apk");

    let listing = list(&server).await;
    assert_eq!(filenames(&listing), vec!["My App.apk".to_string()]);
    assert_eq!(listing[0]["url"], "/uploads/My%20App.apk");

    let uploads = std::path::Path::new(&config.storage.uploads_path);
    assert!(uploads.join("My App.apk").exists());
    assert!(!uploads.join(&filename).exists());
}

#[tokio::test]
async fn test_rename_keeps_existing_extension() {
    let (server, _dir, _config) = create_test_server().await;
    let filename = upload(&server, b"x").await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": filename, "newFilename": "release.APK" }))
        .await;
    response.assert_status_ok();
    assert_eq!(filenames(&list(&server).await), vec!["release.APK".to_string()]);
}

#[tokio::test]
async fn test_rename_onto_existing_name_conflicts() {
    let (server, _dir, config) = create_test_server().await;
    let first = upload(&server, b"first").await;
    let second = upload(&server, b"second").await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": first, "newFilename": second }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    assert_eq!(filenames(&list(&server).await), vec![first.clone(), second.clone()]);
    let stored = std::path::Path::new(&config.storage.uploads_path).join(&second);
    assert_eq!(std::fs::read(stored).unwrap(), b"second");
}

#[tokio::test]
async fn test_rename_missing_file() {
    let (server, _dir, _config) = create_test_server().await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": "ghost.apk", "newFilename": "new" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_requires_both_names() {
    let (server, _dir, _config) = create_test_server().await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": "a.apk" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert!(body["error"]["details"]["newFilename"].is_array());
}

#[tokio::test]
async fn test_rename_rejects_path_separators() {
    let (server, _dir, _config) = create_test_server().await;
    let filename = upload(&server, b"x").await;

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": filename, "newFilename": "../escape" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(filenames(&list(&server).await), vec![filename]);
}

#[tokio::test]
async fn test_delete_removes_file_and_entry() {
    let (server, _dir, config) = create_test_server().await;
    let keep = upload(&server, b"keep").await;
    let doomed = upload(&server, b"doomed").await;

    let response = server
        .delete("/delete-apk")
        .json(&json!({ "filename": doomed }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "APK deleted successfully");

    assert_eq!(filenames(&list(&server).await), vec![keep]);
    let uploads = std::path::Path::new(&config.storage.uploads_path);
    assert!(!uploads.join(&doomed).exists());
    assert_eq!(metadata(&config).len(), 1);
}

#[tokio::test]
async fn test_longest_allowed_name_can_be_deleted() {
    let (server, _dir, config) = create_test_server().await;
    let filename = upload(&server, b"x").await;
    let longest = format!("{}.apk", "a".repeat(MAX_FILENAME_LENGTH - 4));

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": filename, "newFilename": longest }))
        .await;
    response.assert_status_ok();

    let response = server
        .delete("/delete-apk")
        .json(&json!({ "filename": longest }))
        .await;
    response.assert_status_ok();
    assert!(list(&server).await.is_empty());
    assert!(metadata(&config).is_empty());

    let response = server
        .patch("/rename-apk")
        .json(&json!({ "oldFilename": filename, "newFilename": "a".repeat(250) }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_absent_file_succeeds() {
    let (server, _dir, _config) = create_test_server().await;

    let response = server
        .delete("/delete-apk")
        .json(&json!({ "filename": "never-uploaded.apk" }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_delete_requires_filename() {
    let (server, _dir, _config) = create_test_server().await;

    let response = server.delete("/delete-apk").json(&json!({})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orphaned_entry_hidden_then_cleaned_by_delete() {
    let (server, _dir, config) = create_test_server().await;
    let filename = upload(&server, b"x").await;

    std::fs::remove_file(std::path::Path::new(&config.storage.uploads_path).join(&filename))
        .unwrap();
    assert!(list(&server).await.is_empty());
    assert_eq!(metadata(&config).len(), 1);

    let response = server
        .delete("/delete-apk")
        .json(&json!({ "filename": filename }))
        .await;
    response.assert_status_ok();
    assert!(metadata(&config).is_empty());
}

#[tokio::test]
async fn test_corrupt_metadata_is_server_error() {
    let (server, _dir, config) = create_test_server().await;
    std::fs::write(&config.storage.metadata_path, "{ not json").unwrap();

    let response = server.get("/apks").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}
