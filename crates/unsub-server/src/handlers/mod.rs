//! HTTP request handlers

mod analyze;

pub use analyze::{analyze_csv, analyze_pdf};

use axum::Json;

/// GET /api/health - Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "unsub-server",
    }))
}
