//! Gateway integration tests.
//!
//! Run with: `cargo test -p mediagate-api --test gateway_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::setup_test_app;
use mediagate_storage::ObjectStore;
use serde_json::Value;

fn text_file_form(filename: &str, data: &'static [u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(data).file_name(filename).mime_type("text/plain"),
    )
}

#[tokio::test]
async fn upload_then_download_round_trip() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files")
        .multipart(text_file_form("a.txt", b"0123456789"))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let key = body["key"].as_str().unwrap().to_string();
    assert!(key.ends_with(".txt"));
    assert_ne!(key, "a.txt");
    assert_eq!(body["original_filename"], "a.txt");

    let download = app.server.get(&format!("/api/v0/files/{key}")).await;
    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), b"0123456789");
    assert_eq!(
        download.headers()["content-disposition"],
        "inline; filename=a.txt"
    );
    assert_eq!(download.headers()["content-type"], "text/plain");

    // Store-internal headers must never escape the proxy.
    assert!(!download
        .headers()
        .keys()
        .any(|name| name.as_str().starts_with("x-amz")));
    assert!(!download.headers().contains_key("set-cookie"));
}

#[tokio::test]
async fn filename_spaces_encode_as_percent_20() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files")
        .multipart(text_file_form("annual report 2024.txt", b"x"))
        .await;
    response.assert_status_ok();
    let key = response.json::<Value>()["key"].as_str().unwrap().to_string();

    let download = app.server.get(&format!("/api/v0/files/{key}")).await;
    let disposition = download.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        disposition,
        "inline; filename=annual%20report%202024.txt"
    );
    assert!(!disposition.contains('+'));
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files")
        .multipart(text_file_form("a.txt", b"0123456789"))
        .await;
    let key = response.json::<Value>()["key"].as_str().unwrap().to_string();

    let download = app
        .server
        .get(&format!("/api/v0/files/{key}"))
        .add_header("range", "bytes=2-5")
        .await;
    download.assert_status(axum::http::StatusCode::PARTIAL_CONTENT);
    assert_eq!(download.as_bytes().as_ref(), b"2345");
    assert_eq!(download.headers()["content-range"], "bytes 2-5/10");

    // Without a range the same object comes back whole with a 200.
    let full = app.server.get(&format!("/api/v0/files/{key}")).await;
    full.assert_status_ok();
    assert!(!full.headers().contains_key("content-range"));
}

#[tokio::test]
async fn missing_object_passes_store_status_through() {
    let app = setup_test_app();

    let download = app.server.get("/api/v0/files/nope.txt").await;
    download.assert_status(axum::http::StatusCode::NOT_FOUND);
    assert!(download.as_bytes().is_empty());
}

#[tokio::test]
async fn raw_upload_uses_query_filename() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files/raw?filename=report.pdf")
        .add_header("content-type", "application/pdf")
        .bytes(b"%PDF-1.4".as_slice().into())
        .await;
    response.assert_status_ok();
    let key = response.json::<Value>()["key"].as_str().unwrap().to_string();
    assert!(key.ends_with(".pdf"));

    let download = app.server.get(&format!("/api/v0/files/{key}")).await;
    download.assert_status_ok();
    assert_eq!(
        download.headers()["content-disposition"],
        "inline; filename=report.pdf"
    );
}

#[tokio::test]
async fn replace_overwrites_existing_key() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files")
        .multipart(text_file_form("a.txt", b"first"))
        .await;
    let key = response.json::<Value>()["key"].as_str().unwrap().to_string();

    let replace = app
        .server
        .put(&format!("/api/v0/files/{key}"))
        .multipart(text_file_form("b.txt", b"second"))
        .await;
    replace.assert_status_ok();

    let download = app.server.get(&format!("/api/v0/files/{key}")).await;
    assert_eq!(download.as_bytes().as_ref(), b"second");
    assert_eq!(
        download.headers()["content-disposition"],
        "inline; filename=b.txt"
    );
}

#[tokio::test]
async fn multipart_upload_without_filename_is_rejected() {
    let app = setup_test_app();

    let form = MultipartForm::new().add_part("file", Part::bytes(b"data".as_slice()));
    let response = app.server.post("/api/v0/files").multipart(form).await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn multipart_replace_without_filename_is_rejected() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/v0/files")
        .multipart(text_file_form("a.txt", b"original"))
        .await;
    let key = response.json::<Value>()["key"].as_str().unwrap().to_string();

    let form = MultipartForm::new().add_part("file", Part::bytes(b"data".as_slice()));
    let replace = app
        .server
        .put(&format!("/api/v0/files/{key}"))
        .multipart(form)
        .await;
    replace.assert_status(axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(replace.json::<Value>()["code"], "INVALID_INPUT");

    // The stored object is untouched by the rejected replace.
    let download = app.server.get(&format!("/api/v0/files/{key}")).await;
    assert_eq!(download.as_bytes().as_ref(), b"original");
    assert_eq!(
        download.headers()["content-disposition"],
        "inline; filename=a.txt"
    );
}

#[tokio::test]
async fn transcode_rejects_non_video_content() {
    let app = setup_test_app();

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4".as_slice())
            .file_name("doc.pdf")
            .mime_type("application/pdf"),
    );
    let response = app.server.post("/api/v0/videos/hls").multipart(form).await;
    response.assert_status(axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        response.json::<Value>()["code"],
        "UNSUPPORTED_MEDIA_TYPE"
    );
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn transcode_streams_progress_saving_and_done() {
    let app = setup_test_app();

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"fake-video-bytes".as_slice())
            .file_name("clip.mp4")
            .mime_type("video/mp4"),
    );
    let response = app.server.post("/api/v0/videos/hls").multipart(form).await;
    response.assert_status_ok();
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = response.text();
    assert!(body.contains("event: progress"));
    assert!(body.contains("event: saving"));
    assert!(body.contains("event: done"));
    let done_pos = body.rfind("event: done").unwrap();
    assert!(body.rfind("event: saving").unwrap() < done_pos);

    // Two segments and the playlist were published.
    let keys = app.store.keys().await;
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().any(|k| k.ends_with(".m3u8")));
    assert_eq!(keys.iter().filter(|k| k.ends_with(".ts")).count(), 2);
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = setup_test_app();

    app.server.get("/health/live").await.assert_status_ok();
    // Readiness flips once the bucket exists.
    let not_ready = app.server.get("/health/ready").await;
    not_ready.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);

    app.store.create_bucket().await.unwrap();
    app.server.get("/health/ready").await.assert_status_ok();
}
