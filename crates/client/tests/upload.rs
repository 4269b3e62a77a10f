//! Presigned upload flow tests against a mock HTTP server.

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linework_client::upload::{UploadClient, UploadError, UploadStep};

fn confirmation_body(key: &str, size: u64) -> serde_json::Value {
    json!({
        "success": true,
        "message": "Upload confirmed",
        "file_info": {
            "key": key,
            "size": size,
            "etag": "\"abc123\"",
            "last_modified": "2026-08-01T10:00:00Z",
            "content_type": "image/png"
        }
    })
}

#[tokio::test]
async fn upload_file_runs_the_full_presigned_flow() {
    let server = MockServer::start().await;
    let bytes = vec![0x89u8, 0x50, 0x4e, 0x47];

    Mock::given(method("POST"))
        .and(path("/upload/presigned-url"))
        .and(query_param("filename", "cat.png"))
        .and(query_param("content_type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "presigned_url": format!("{}/bucket/uploads/abc.png", server.uri()),
            "key": "uploads/abc.png",
            "file_url": format!("{}/bucket/uploads/abc.png", server.uri()),
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/bucket/uploads/abc.png"))
        .and(header("content-type", "image/png"))
        .and(body_bytes(bytes.clone()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/confirm"))
        .and(query_param("key", "uploads/abc.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(confirmation_body("uploads/abc.png", 4)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let upload = UploadClient::new(server.uri());
    let mut steps = Vec::new();

    let confirmation = upload
        .upload_file("cat.png", "image/png", bytes, |step| steps.push(step))
        .await
        .unwrap();

    assert!(confirmation.success);
    assert_eq!(confirmation.file_info.key, "uploads/abc.png");
    assert_eq!(
        steps,
        vec![
            UploadStep::Started,
            UploadStep::UrlIssued,
            UploadStep::Transferred,
            UploadStep::Confirmed,
        ]
    );
}

#[tokio::test]
async fn validation_failure_makes_no_requests() {
    let server = MockServer::start().await;
    let upload = UploadClient::new(server.uri());

    let err = upload
        .upload_file("doc.pdf", "application/pdf", vec![0u8; 16], |_| {})
        .await
        .unwrap_err();

    assert_matches!(err, UploadError::UnsupportedType(t) if t == "application/pdf");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_put_surfaces_the_store_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/presigned-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "presigned_url": format!("{}/bucket/uploads/abc.png", server.uri()),
            "key": "uploads/abc.png",
            "file_url": format!("{}/bucket/uploads/abc.png", server.uri()),
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/bucket/uploads/abc.png"))
        .respond_with(ResponseTemplate::new(403).set_body_string("signature expired"))
        .mount(&server)
        .await;

    let upload = UploadClient::new(server.uri());
    let err = upload
        .upload_file("cat.png", "image/png", vec![1, 2, 3], |_| {})
        .await
        .unwrap_err();

    assert_matches!(err, UploadError::Api { status: 403, ref body } if body == "signature expired");
}

#[tokio::test]
async fn download_url_encodes_slashed_keys_as_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/upload/download-url/uploads%2Fabc.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "download_url": "https://store.example/signed",
            "key": "uploads/abc.png",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let upload = UploadClient::new(server.uri());
    let link = upload.download_url("uploads/abc.png").await.unwrap();
    assert_eq!(link.key, "uploads/abc.png");
    assert_eq!(link.download_url, "https://store.example/signed");
}

#[tokio::test]
async fn confirm_forwards_the_etag_when_present() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/confirm"))
        .and(query_param("key", "uploads/abc.png"))
        .and(query_param("etag", "\"abc123\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(confirmation_body("uploads/abc.png", 4)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let upload = UploadClient::new(server.uri());
    let confirmation = upload
        .confirm("uploads/abc.png", Some("\"abc123\""))
        .await
        .unwrap();
    assert!(confirmation.success);
}
