//! Unsub Core Library
//!
//! Shared functionality for the unsub subscription finder:
//! - PDF text extraction with a scanned-document guard
//! - Multi-strategy transaction line parsing and CSV import
//! - Merchant normalization with a known-service vocabulary
//! - Recurring-charge pattern detection and confidence scoring
//! - Pluggable validator backends with a local-statistics fallback
//! - Result deduplication and pipeline orchestration

pub mod ai;
pub mod dedupe;
pub mod detect;
pub mod error;
pub mod extract;
pub mod import;
pub mod models;
pub mod normalize;
pub mod parse;
pub mod pipeline;

pub use ai::{
    MockBackend, OpenAICompatibleBackend, ValidatedSubscription, ValidatorBackend, ValidatorClient,
};
pub use dedupe::dedupe_subscriptions;
pub use detect::{
    candidate_to_subscription, detect_candidates, group_transactions, DetectionConfig,
    DetectionSource,
};
pub use error::{Error, Result};
pub use extract::{extract_pdf_text, PdfText};
pub use import::parse_csv;
pub use models::{
    DetectedSubscription, Frequency, MerchantGroup, SubscriptionCandidate, Transaction,
    TransactionKind,
};
pub use normalize::{normalize_merchant, same_merchant, NormalizedMerchant};
pub use parse::parse_statement_text;
pub use pipeline::{
    AnalysisReport, AnalysisStage, Analyzer, ProgressCallback, ProgressEvent,
};
