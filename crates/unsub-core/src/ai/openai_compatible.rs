//! OpenAI-compatible validator backend
//!
//! Works with any server that implements the OpenAI chat completions API:
//! hosted providers as well as vLLM, LocalAI and llama-server.
//!
//! # Configuration
//!
//! Environment variables:
//! - `VALIDATOR_HOST`: Server URL (required)
//! - `VALIDATOR_MODEL`: Model name (default: gpt-4o-mini)
//! - `VALIDATOR_API_KEY`: API key if required (optional)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::SubscriptionCandidate;

use super::parsing::parse_validation_response;
use super::types::ValidatedSubscription;
use super::ValidatorBackend;

/// Validator backed by an OpenAI-compatible chat completions server
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from environment variables
    ///
    /// Required: `VALIDATOR_HOST`
    /// Optional: `VALIDATOR_MODEL` (default: gpt-4o-mini), `VALIDATOR_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("VALIDATOR_HOST").ok()?;
        let model =
            std::env::var("VALIDATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let api_key = std::env::var("VALIDATOR_API_KEY").ok();

        let mut backend = Self::new(&host, &model);
        backend.api_key = api_key;
        Some(backend)
    }

    /// Make a chat completion request
    async fn chat_completion(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(0.1),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Validation(format!(
                "validator API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Validation("empty response from validator API".into()))
    }
}

/// Render one batch of candidates into the validation prompt.
///
/// The prompt carries everything the model needs to confirm or refine each
/// candidate: name, observation count, representative amount, cadence and the
/// raw transactions themselves.
fn build_validation_prompt(candidates: &[SubscriptionCandidate]) -> String {
    let mut prompt = String::from(
        "You are reviewing recurring-charge candidates extracted from a bank \
         statement. For each candidate, decide whether it is a real paid \
         subscription (streaming, software, memberships and similar services \
         a person could cancel). Drop anything that is a utility bill, a bank \
         fee, a transfer or a one-off purchase.\n\nCandidates:\n",
    );

    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "\n{}. merchant: {}\n   transactions: {}\n   representative amount: {:.2} {}\n   mean interval: {:.1} days ({})\n   local confidence: {}/100\n   charges:\n",
            i + 1,
            c.group.normalized_merchant,
            c.group.transactions.len(),
            c.average_amount,
            c.currency,
            c.average_interval_days,
            c.frequency,
            c.confidence,
        ));
        for tx in &c.group.transactions {
            prompt.push_str(&format!(
                "     - {} | {:.2} {} | {}\n",
                tx.date, tx.amount, tx.currency, tx.beneficiary
            ));
        }
    }

    prompt.push_str(
        "\nRespond with ONLY a JSON array, no other text. One object per \
         confirmed subscription, with exactly these fields:\n\
         [{\"merchant_name\": string, \"category\": string, \
         \"average_amount\": number, \"currency\": string, \
         \"frequency\": \"weekly\"|\"monthly\"|\"bimonthly\"|\"quarterly\", \
         \"confidence\": integer 0-100}]\n\
         Return [] if none of the candidates is a real subscription.",
    );

    prompt
}

#[async_trait]
impl ValidatorBackend for OpenAICompatibleBackend {
    async fn validate_candidates(
        &self,
        candidates: &[SubscriptionCandidate],
    ) -> Result<Vec<ValidatedSubscription>> {
        let prompt = build_validation_prompt(candidates);
        let response = self.chat_completion(&prompt).await?;

        debug!(
            model = %self.model,
            batch = candidates.len(),
            response_len = response.len(),
            "validator response received"
        );

        parse_validation_response(&response)
    }

    async fn health_check(&self) -> bool {
        // /v1/models first (standard OpenAI endpoint), then /health
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        if let Ok(resp) = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Frequency, MerchantGroup, Transaction, TransactionKind,
    };

    fn candidate() -> SubscriptionCandidate {
        let tx = Transaction {
            date: "2024-03-01".parse().unwrap(),
            amount: 45.0,
            currency: "RON".to_string(),
            beneficiary: "NETFLIX.COM".to_string(),
            description: "NETFLIX.COM".to_string(),
            kind: TransactionKind::Debit,
        };
        SubscriptionCandidate {
            group: MerchantGroup {
                normalized_merchant: "Netflix".to_string(),
                transactions: vec![tx],
                raw_merchants: vec!["NETFLIX.COM".to_string()],
            },
            average_amount: 45.0,
            currency: "RON".to_string(),
            average_interval_days: 30.0,
            frequency: Frequency::Monthly,
            confidence: 90,
            last_transaction_date: "2024-03-01".parse().unwrap(),
            category: Some("streaming".to_string()),
        }
    }

    #[test]
    fn test_prompt_carries_candidate_details() {
        let prompt = build_validation_prompt(&[candidate()]);
        assert!(prompt.contains("Netflix"));
        assert!(prompt.contains("45.00 RON"));
        assert!(prompt.contains("monthly"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_backend_from_env_missing() {
        std::env::remove_var("VALIDATOR_HOST");
        assert!(OpenAICompatibleBackend::from_env().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000/", "test-model");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.model(), "test-model");
    }
}
