//! Wire types for validator responses

use serde::{de, Deserialize, Deserializer, Serialize};

/// One validated subscription as returned by the external model.
///
/// The response schema is strict: all six fields must be present and
/// `confidence` must be an integer in 0..=100. Anything else fails the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedSubscription {
    pub merchant_name: String,
    pub category: String,
    pub average_amount: f64,
    pub currency: String,
    pub frequency: String,
    #[serde(deserialize_with = "confidence_in_range")]
    pub confidence: u8,
}

fn confidence_in_range<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u8::deserialize(deserializer)?;
    if value > 100 {
        return Err(de::Error::custom(format!(
            "confidence {} outside 0..=100",
            value
        )));
    }
    Ok(value)
}
