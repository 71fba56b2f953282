//! Analysis pipeline
//!
//! Ties the stages together: ingest (CSV rows or PDF text), group, score,
//! validate in batches against the external model, deduplicate. The whole
//! run is request-scoped; there is no shared mutable state between runs.
//!
//! Progress is reported through an optional callback so callers (the SSE
//! endpoint, the CLI) can surface long-running validation. Emitting progress
//! never changes the result.

use std::io::Cursor;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{ValidatorBackend, ValidatorClient};
use crate::dedupe::dedupe_subscriptions;
use crate::detect::{
    candidate_to_subscription, detect_candidates, group_transactions, DetectionConfig,
    DetectionSource,
};
use crate::error::Result;
use crate::extract::extract_pdf_text;
use crate::import::parse_csv;
use crate::models::{DetectedSubscription, SubscriptionCandidate, Transaction};
use crate::parse::parse_statement_text;

/// Candidates per validation request
const VALIDATION_BATCH_SIZE: usize = 5;

/// Pause between validation batches, to stay under provider rate limits
const VALIDATION_BATCH_DELAY: Duration = Duration::from_millis(1000);

/// Pipeline stage reported through the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStage {
    Chunking,
    Processing,
    Merging,
    Complete,
}

/// One progress update
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub stage: AnalysisStage,
    pub current_chunk: usize,
    pub total_chunks: usize,
}

/// Progress callback for long-running analysis
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Result of one analysis run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub subscriptions: Vec<DetectedSubscription>,
    pub transaction_count: usize,
    /// "csv" or "pdf"
    pub extraction_method: String,
    /// Pages in the source document; zero for CSV input
    pub page_count: usize,
    pub processing_ms: u128,
}

/// The detection engine front door
///
/// Holds the scoring configuration and an optional validator. Without a
/// validator every accepted candidate is reported from local statistics.
pub struct Analyzer {
    config: DetectionConfig,
    validator: Option<ValidatorClient>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
            validator: None,
        }
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self {
            config,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: ValidatorClient) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Pick up the validator from environment variables, if configured
    pub fn with_validator_from_env(mut self) -> Self {
        self.validator = ValidatorClient::from_env();
        self
    }

    /// Analyze a CSV statement export.
    pub async fn analyze_csv(
        &self,
        bytes: &[u8],
        progress: Option<&ProgressCallback>,
    ) -> Result<AnalysisReport> {
        let started = Instant::now();
        emit(progress, AnalysisStage::Chunking, 0, 1);

        let transactions = parse_csv(Cursor::new(bytes))?;
        self.finish_analysis(
            transactions,
            DetectionSource::Csv,
            "csv",
            0,
            started,
            progress,
        )
        .await
    }

    /// Analyze a PDF bank statement.
    pub async fn analyze_pdf(
        &self,
        bytes: &[u8],
        progress: Option<&ProgressCallback>,
    ) -> Result<AnalysisReport> {
        let started = Instant::now();
        emit(progress, AnalysisStage::Chunking, 0, 1);

        let pdf = extract_pdf_text(bytes)?;
        let transactions = parse_statement_text(&pdf.text)?;
        self.finish_analysis(
            transactions,
            DetectionSource::Pdf,
            "pdf",
            pdf.page_count,
            started,
            progress,
        )
        .await
    }

    /// The shared tail of both ingestion paths.
    async fn finish_analysis(
        &self,
        transactions: Vec<Transaction>,
        source: DetectionSource,
        extraction_method: &str,
        page_count: usize,
        started: Instant,
        progress: Option<&ProgressCallback>,
    ) -> Result<AnalysisReport> {
        let transaction_count = transactions.len();

        let groups = group_transactions(&transactions);
        let candidates = detect_candidates(groups, source, &self.config);

        debug!(
            transactions = transaction_count,
            candidates = candidates.len(),
            ?source,
            "pattern detection finished"
        );

        let subscriptions = self.validate_candidates(candidates, progress).await;

        emit(progress, AnalysisStage::Merging, 0, 1);
        let subscriptions = dedupe_subscriptions(subscriptions);
        emit(progress, AnalysisStage::Complete, 1, 1);

        info!(
            subscriptions = subscriptions.len(),
            transactions = transaction_count,
            extraction_method,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(AnalysisReport {
            subscriptions,
            transaction_count,
            extraction_method: extraction_method.to_string(),
            page_count,
            processing_ms: started.elapsed().as_millis(),
        })
    }

    /// Run candidates through the validator in fixed-size batches.
    ///
    /// A failed batch is isolated: its candidates fall back to the local
    /// statistics and the run continues. Without a configured validator the
    /// fallback applies to everything.
    async fn validate_candidates(
        &self,
        candidates: Vec<SubscriptionCandidate>,
        progress: Option<&ProgressCallback>,
    ) -> Vec<DetectedSubscription> {
        let Some(validator) = &self.validator else {
            return candidates
                .into_iter()
                .map(candidate_to_subscription)
                .collect();
        };

        let batches: Vec<&[SubscriptionCandidate]> =
            candidates.chunks(VALIDATION_BATCH_SIZE).collect();
        let total_batches = batches.len();
        let mut subscriptions = Vec::with_capacity(candidates.len());

        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(VALIDATION_BATCH_DELAY).await;
            }
            emit(progress, AnalysisStage::Processing, i + 1, total_batches);

            match validator.validate_candidates(batch).await {
                Ok(validated) => {
                    debug!(
                        batch = i + 1,
                        total_batches,
                        confirmed = validated.len(),
                        "validator batch succeeded"
                    );
                    subscriptions.extend(merge_validated(batch, validated));
                }
                Err(e) => {
                    warn!(
                        batch = i + 1,
                        total_batches,
                        error = %e,
                        "validator batch failed, using local statistics"
                    );
                    subscriptions.extend(batch.iter().cloned().map(candidate_to_subscription));
                }
            }
        }

        subscriptions
    }
}

/// Merge one batch's validator verdicts back onto the local candidates.
///
/// The validator can rename, recategorize and rescore, but it only ever
/// narrows the batch: a verdict that matches no candidate is dropped, so
/// locally rejected merchants cannot reappear.
fn merge_validated(
    batch: &[SubscriptionCandidate],
    validated: Vec<crate::ai::ValidatedSubscription>,
) -> Vec<DetectedSubscription> {
    let mut merged = Vec::with_capacity(validated.len());

    for v in validated {
        let Some(candidate) = batch.iter().find(|c| {
            crate::normalize::same_merchant(&c.group.normalized_merchant, &v.merchant_name)
        }) else {
            warn!(merchant = %v.merchant_name, "validator returned an unknown merchant, dropping");
            continue;
        };

        let frequency = v.frequency.parse().unwrap_or(candidate.frequency);
        let last = candidate.last_transaction_date;
        let average_amount = if v.average_amount > 0.0 {
            v.average_amount
        } else {
            candidate.average_amount
        };

        merged.push(DetectedSubscription {
            beneficiary: v.merchant_name,
            average_amount,
            currency: if v.currency.is_empty() {
                candidate.currency.clone()
            } else {
                v.currency
            },
            frequency,
            confidence: f64::from(v.confidence.min(100)) / 100.0,
            transactions: candidate.group.transactions.clone(),
            last_transaction_date: last,
            next_estimated_payment: last + chrono::Duration::days(frequency.interval_days()),
            total_paid_amount: average_amount * frequency.per_year(),
            category: Some(v.category),
        });
    }

    merged
}

fn emit(progress: Option<&ProgressCallback>, stage: AnalysisStage, current: usize, total: usize) {
    if let Some(cb) = progress {
        cb(ProgressEvent {
            stage,
            current_chunk: current,
            total_chunks: total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ValidatedSubscription;
    use crate::models::{Frequency, MerchantGroup, TransactionKind};

    fn candidate(merchant: &str, amount: f64) -> SubscriptionCandidate {
        let tx = Transaction {
            date: "2024-03-01".parse().unwrap(),
            amount,
            currency: "RON".to_string(),
            beneficiary: merchant.to_string(),
            description: merchant.to_string(),
            kind: TransactionKind::Debit,
        };
        SubscriptionCandidate {
            group: MerchantGroup {
                normalized_merchant: merchant.to_string(),
                transactions: vec![tx],
                raw_merchants: vec![merchant.to_string()],
            },
            average_amount: amount,
            currency: "RON".to_string(),
            average_interval_days: 30.0,
            frequency: Frequency::Monthly,
            confidence: 80,
            last_transaction_date: "2024-03-01".parse().unwrap(),
            category: None,
        }
    }

    #[test]
    fn test_merge_validated_keeps_candidate_transactions() {
        let batch = vec![candidate("Netflix", 45.0)];
        let validated = vec![ValidatedSubscription {
            merchant_name: "Netflix".to_string(),
            category: "streaming".to_string(),
            average_amount: 45.0,
            currency: "RON".to_string(),
            frequency: "monthly".to_string(),
            confidence: 95,
        }];
        let merged = merge_validated(&batch, validated);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].transactions.len(), 1);
        assert_eq!(merged[0].confidence, 0.95);
        assert_eq!(merged[0].category.as_deref(), Some("streaming"));
        assert!(merged[0].next_estimated_payment > merged[0].last_transaction_date);
    }

    #[test]
    fn test_merge_validated_drops_unknown_merchants() {
        let batch = vec![candidate("Netflix", 45.0)];
        let validated = vec![ValidatedSubscription {
            merchant_name: "Totally Different Service".to_string(),
            category: "other".to_string(),
            average_amount: 10.0,
            currency: "RON".to_string(),
            frequency: "monthly".to_string(),
            confidence: 95,
        }];
        assert!(merge_validated(&batch, validated).is_empty());
    }

    #[test]
    fn test_merge_validated_bad_frequency_falls_back() {
        let batch = vec![candidate("Netflix", 45.0)];
        let validated = vec![ValidatedSubscription {
            merchant_name: "Netflix".to_string(),
            category: "streaming".to_string(),
            average_amount: 45.0,
            currency: "RON".to_string(),
            frequency: "fortnightly".to_string(),
            confidence: 95,
        }];
        let merged = merge_validated(&batch, validated);
        assert_eq!(merged[0].frequency, Frequency::Monthly);
    }

    #[tokio::test]
    async fn test_analyze_csv_without_validator() {
        let csv = "Date,Amount,Merchant\n\
                   05.01.2024,45.00,NETFLIX.COM\n\
                   05.02.2024,45.00,NETFLIX.COM\n\
                   05.03.2024,45.00,NETFLIX.COM";
        let analyzer = Analyzer::new();
        let report = analyzer.analyze_csv(csv.as_bytes(), None).await.unwrap();
        assert_eq!(report.transaction_count, 3);
        assert_eq!(report.extraction_method, "csv");
        assert_eq!(report.page_count, 0);
        assert_eq!(report.subscriptions.len(), 1);
        assert_eq!(report.subscriptions[0].beneficiary, "Netflix");
    }

    #[tokio::test]
    async fn test_progress_emission_does_not_change_result() {
        let csv = "Date,Amount,Merchant\n\
                   05.01.2024,45.00,NETFLIX.COM\n\
                   05.02.2024,45.00,NETFLIX.COM\n\
                   05.03.2024,45.00,NETFLIX.COM";

        let analyzer = Analyzer::new().with_validator(ValidatorClient::mock());
        let quiet = analyzer.analyze_csv(csv.as_bytes(), None).await.unwrap();

        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        let cb: ProgressCallback = Box::new(move |e| sink.lock().unwrap().push(e.stage));
        let loud = analyzer
            .analyze_csv(csv.as_bytes(), Some(&cb))
            .await
            .unwrap();

        assert_eq!(
            quiet.subscriptions.len(),
            loud.subscriptions.len()
        );
        let stages = events.lock().unwrap();
        assert_eq!(stages.first(), Some(&AnalysisStage::Chunking));
        assert_eq!(stages.last(), Some(&AnalysisStage::Complete));
        assert!(stages.contains(&AnalysisStage::Processing));
        assert!(stages.contains(&AnalysisStage::Merging));
    }
}
