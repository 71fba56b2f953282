//! Statement analysis handlers
//!
//! Both upload endpoints accept a multipart form with a single `file` field
//! and answer with a Server-Sent Events stream of JSON events:
//!
//! - `{"type": "start", ...}` once, immediately
//! - `{"type": "progress", "stage": ...}` for coarse stage changes
//! - `{"type": "analysis_progress", "stage": "processing",
//!    "currentChunk": n, "totalChunks": m}` during batched validation
//! - exactly one terminal `{"type": "complete", ...}` or `{"type": "error", ...}`
//!
//! Input validation failures (missing file, wrong type, oversized) are
//! rejected with a plain 4xx before the stream starts.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use unsub_core::{AnalysisStage, Analyzer, ProgressCallback, ProgressEvent};

use crate::{AppError, AppState, MAX_UPLOAD_SIZE};

#[derive(Clone, Copy)]
enum UploadKind {
    Csv,
    Pdf,
}

impl UploadKind {
    fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Csv => "csv",
            UploadKind::Pdf => "pdf",
        }
    }
}

/// POST /api/analyze/csv - Analyze a CSV statement export
pub async fn analyze_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let data = read_upload(multipart, UploadKind::Csv).await?;
    Ok(stream_analysis(state, data, UploadKind::Csv))
}

/// POST /api/analyze/pdf - Analyze a PDF bank statement
pub async fn analyze_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let data = read_upload(multipart, UploadKind::Pdf).await?;
    Ok(stream_analysis(state, data, UploadKind::Pdf))
}

/// Pull the `file` field out of the multipart form and validate it.
async fn read_upload(mut multipart: Multipart, kind: UploadKind) -> Result<Vec<u8>, AppError> {
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;

        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::payload_too_large(&format!(
                "File too large. Maximum size is {} MB",
                MAX_UPLOAD_SIZE / 1024 / 1024
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::bad_request("Uploaded file is empty"));
        }

        if let UploadKind::Pdf = kind {
            let declared_pdf = content_type
                .as_deref()
                .map(|ct| ct.contains("pdf"))
                .unwrap_or(false);
            if !declared_pdf && !bytes.starts_with(b"%PDF") {
                return Err(AppError::bad_request(
                    "The uploaded file does not look like a PDF",
                ));
            }
        }

        file_data = Some(bytes.to_vec());
    }

    file_data.ok_or_else(|| AppError::bad_request("Missing file field"))
}

/// Run the pipeline in a background task and stream its events.
fn stream_analysis(
    state: Arc<AppState>,
    data: Vec<u8>,
    kind: UploadKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<serde_json::Value>();

    let _ = tx.send(serde_json::json!({
        "type": "start",
        "extractionMethod": kind.as_str(),
        "fileSize": data.len(),
    }));

    tokio::spawn(async move {
        let mut analyzer = Analyzer::with_config(state.detection.clone());
        if let Some(validator) = &state.validator {
            analyzer = analyzer.with_validator(validator.clone());
        }

        let progress_tx = tx.clone();
        let progress: ProgressCallback = Box::new(move |e: ProgressEvent| {
            let event = match e.stage {
                AnalysisStage::Processing => serde_json::json!({
                    "type": "analysis_progress",
                    "stage": e.stage,
                    "currentChunk": e.current_chunk,
                    "totalChunks": e.total_chunks,
                }),
                // The terminal payload carries completion, no bare event
                AnalysisStage::Complete => return,
                _ => serde_json::json!({
                    "type": "progress",
                    "stage": e.stage,
                }),
            };
            let _ = progress_tx.send(event);
        });

        let result = match kind {
            UploadKind::Csv => analyzer.analyze_csv(&data, Some(&progress)).await,
            UploadKind::Pdf => analyzer.analyze_pdf(&data, Some(&progress)).await,
        };

        let terminal = match result {
            Ok(report) => {
                debug!(
                    subscriptions = report.subscriptions.len(),
                    method = kind.as_str(),
                    "streamed analysis complete"
                );
                serde_json::json!({
                    "type": "complete",
                    "subscriptions": report.subscriptions,
                    "transactionCount": report.transaction_count,
                    "extractionMethod": report.extraction_method,
                    "pageCount": report.page_count,
                    "processingMs": report.processing_ms,
                })
            }
            Err(e) => {
                warn!(error = %e, method = kind.as_str(), "streamed analysis failed");
                serde_json::json!({
                    "type": "error",
                    "code": e.code(),
                    "error": e.to_string(),
                })
            }
        };
        let _ = tx.send(terminal);
    });

    let stream = UnboundedReceiverStream::new(rx).filter_map(|value| {
        match Event::default().json_data(&value) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "failed to serialize SSE event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
