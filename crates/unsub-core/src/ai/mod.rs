//! Pluggable validator backend abstraction
//!
//! Subscription candidates are passed to an external model for a second
//! opinion: confirm real subscriptions, drop misclassified utilities and
//! one-off purchases, and attach a category. The backend is pluggable so
//! tests run against a mock and deployments pick their server via
//! environment variables.
//!
//! # Configuration
//!
//! - `VALIDATOR_BACKEND`: Backend to use (openai_compatible, mock).
//!   Default: openai_compatible
//! - `VALIDATOR_HOST`: Server URL (required for openai_compatible)
//! - `VALIDATOR_MODEL`: Model name (default: gpt-4o-mini)
//! - `VALIDATOR_API_KEY`: API key if required (optional)

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::ValidatedSubscription;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SubscriptionCandidate;

/// Trait defining the interface for validator backends
#[async_trait]
pub trait ValidatorBackend: Send + Sync {
    /// Validate one batch of candidates.
    ///
    /// An `Err` means the whole batch failed and the caller should fall back
    /// to the local statistics for these candidates.
    async fn validate_candidates(
        &self,
        candidates: &[SubscriptionCandidate],
    ) -> Result<Vec<ValidatedSubscription>>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete validator client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ValidatorClient {
    /// Any server implementing the OpenAI chat completions API
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ValidatorClient {
    /// Create a validator client from environment variables
    ///
    /// Checks `VALIDATOR_BACKEND` to pick the backend. Returns None when the
    /// required variables are not set; the pipeline then runs with local
    /// statistics only.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("VALIDATOR_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(ValidatorClient::OpenAICompatible)
            }
            "mock" => Some(ValidatorClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown VALIDATOR_BACKEND, falling back to openai_compatible");
                OpenAICompatibleBackend::from_env().map(ValidatorClient::OpenAICompatible)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ValidatorClient::Mock(MockBackend::new())
    }

    /// Create a mock backend whose every batch fails
    pub fn failing_mock() -> Self {
        ValidatorClient::Mock(MockBackend::failing())
    }
}

#[async_trait]
impl ValidatorBackend for ValidatorClient {
    async fn validate_candidates(
        &self,
        candidates: &[SubscriptionCandidate],
    ) -> Result<Vec<ValidatedSubscription>> {
        match self {
            ValidatorClient::OpenAICompatible(b) => b.validate_candidates(candidates).await,
            ValidatorClient::Mock(b) => b.validate_candidates(candidates).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ValidatorClient::OpenAICompatible(b) => b.health_check().await,
            ValidatorClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ValidatorClient::OpenAICompatible(b) => b.model(),
            ValidatorClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ValidatorClient::OpenAICompatible(b) => b.host(),
            ValidatorClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_client_mock() {
        let client = ValidatorClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = ValidatorClient::mock();
        assert!(client.health_check().await);
    }
}
