//! Mock validator backend for testing
//!
//! Returns predictable responses without a running model server. The failing
//! variant is used to exercise the local-statistics fallback path.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::SubscriptionCandidate;

use super::types::ValidatedSubscription;
use super::ValidatorBackend;

/// Mock validator
///
/// By default it confirms every candidate verbatim, echoing the local
/// statistics back with the candidate's own confidence.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// When set, every batch fails with a validation error
    pub always_fail: bool,
}

impl MockBackend {
    /// Create a healthy mock that confirms everything
    pub fn new() -> Self {
        Self {
            healthy: true,
            always_fail: false,
        }
    }

    /// Create a mock whose every batch fails
    pub fn failing() -> Self {
        Self {
            healthy: true,
            always_fail: true,
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            always_fail: false,
        }
    }
}

#[async_trait]
impl ValidatorBackend for MockBackend {
    async fn validate_candidates(
        &self,
        candidates: &[SubscriptionCandidate],
    ) -> Result<Vec<ValidatedSubscription>> {
        if self.always_fail {
            return Err(Error::Validation("mock backend configured to fail".into()));
        }

        Ok(candidates
            .iter()
            .map(|c| ValidatedSubscription {
                merchant_name: c.group.normalized_merchant.clone(),
                category: c
                    .category
                    .clone()
                    .unwrap_or_else(|| "other".to_string()),
                average_amount: c.average_amount,
                currency: c.currency.clone(),
                frequency: c.frequency.to_string(),
                confidence: c.confidence,
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, MerchantGroup, Transaction, TransactionKind};

    fn candidate(merchant: &str) -> SubscriptionCandidate {
        let tx = Transaction {
            date: "2024-03-01".parse().unwrap(),
            amount: 45.0,
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
            average_amount: 45.0,
            currency: "RON".to_string(),
            average_interval_days: 30.0,
            frequency: Frequency::Monthly,
            confidence: 85,
            last_transaction_date: "2024-03-01".parse().unwrap(),
            category: None,
        }
    }

    #[tokio::test]
    async fn test_mock_confirms_candidates() {
        let mock = MockBackend::new();
        let validated = mock
            .validate_candidates(&[candidate("Netflix")])
            .await
            .unwrap();
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].merchant_name, "Netflix");
        assert_eq!(validated[0].confidence, 85);
    }

    #[tokio::test]
    async fn test_failing_mock_errors_every_batch() {
        let mock = MockBackend::failing();
        let err = mock
            .validate_candidates(&[candidate("Netflix")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_unhealthy_mock() {
        assert!(!MockBackend::unhealthy().health_check().await);
        assert!(MockBackend::new().health_check().await);
    }
}
