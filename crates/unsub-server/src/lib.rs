//! Unsub Web Server
//!
//! Axum-based REST API around the detection engine. Statement uploads are
//! answered with a Server-Sent Events stream so the client can render
//! progress while parsing and validation run.
//!
//! - Restrictive CORS policy by default
//! - Input validation (file presence, size and type) before processing
//! - Sanitized error responses; internals only reach the logs

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use unsub_core::{DetectionConfig, ValidatorBackend, ValidatorClient};

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub detection: DetectionConfig,
    pub validator: Option<ValidatorClient>,
}

/// Create the application router
pub fn create_router(config: ServerConfig) -> Router {
    let validator = ValidatorClient::from_env();
    match &validator {
        Some(v) => info!(host = v.host(), model = v.model(), "validator configured"),
        None => info!("validator not configured (set VALIDATOR_HOST), using local statistics"),
    }

    create_router_with_state(config, DetectionConfig::default(), validator)
}

/// Create the router with explicit state (for testing)
pub fn create_router_with_state(
    config: ServerConfig,
    detection: DetectionConfig,
    validator: Option<ValidatorClient>,
) -> Router {
    let state = Arc::new(AppState {
        detection,
        validator,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze/csv", post(handlers::analyze_csv))
        .route("/analyze/pdf", post(handlers::analyze_pdf));

    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::extract::DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 1024))
}

/// Start the server
pub async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(host, port, ServerConfig::default()).await
}

pub async fn serve_with_config(host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let app = create_router(config);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "unsub server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// API error with a sanitized client message
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn payload_too_large(msg: &str) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Generic message to the client, full error to the logs
            message: "An internal error occurred".to_string(),
            internal: Some(err.into()),
        }
    }
}

#[cfg(test)]
mod tests;
