//! Server integration tests
//!
//! Exercise the router directly with tower's oneshot, no listening socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use unsub_core::{DetectionConfig, ValidatorClient};

use crate::{create_router_with_state, ServerConfig};

fn test_router() -> axum::Router {
    create_router_with_state(
        ServerConfig::default(),
        DetectionConfig::default(),
        Some(ValidatorClient::mock()),
    )
}

fn multipart_body(file_contents: &str) -> (String, Vec<u8>) {
    let boundary = "test-boundary-7b5c3d";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"statement.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {file_contents}\r\n\
         --{boundary}--\r\n"
    );
    (
        format!("multipart/form-data; boundary={boundary}"),
        body.into_bytes(),
    )
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_analyze_csv_streams_events() {
    let csv = "Date,Amount,Merchant\n\
               05.01.2024,45.00,NETFLIX.COM\n\
               05.02.2024,45.00,NETFLIX.COM\n\
               05.03.2024,45.00,NETFLIX.COM";
    let (content_type, body) = multipart_body(csv);

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze/csv")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("\"type\":\"start\""), "stream: {}", text);
    assert!(text.contains("\"type\":\"complete\""), "stream: {}", text);
    assert!(text.contains("Netflix"), "stream: {}", text);
    // Exactly one terminal event
    assert_eq!(text.matches("\"type\":\"complete\"").count(), 1);
    assert_eq!(text.matches("\"type\":\"error\"").count(), 0);
}

#[tokio::test]
async fn test_analyze_csv_bad_input_streams_error_event() {
    // Valid upload, but no row yields a transaction: the stream must end
    // with a single error event rather than an HTTP failure.
    let (content_type, body) = multipart_body("Date,Amount,Merchant\nnope,nope,");

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze/csv")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("\"type\":\"error\""), "stream: {}", text);
    assert!(text.contains("no_transactions"), "stream: {}", text);
    assert_eq!(text.matches("\"type\":\"complete\"").count(), 0);
}

#[tokio::test]
async fn test_analyze_missing_file_field_is_rejected() {
    let boundary = "test-boundary-7b5c3d";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"other\"\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze/csv")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Missing file field");
}

#[tokio::test]
async fn test_analyze_pdf_rejects_non_pdf_upload() {
    let (content_type, body) = multipart_body("just,a,csv");

    let response = test_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze/pdf")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
