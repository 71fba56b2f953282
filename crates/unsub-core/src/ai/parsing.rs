//! JSON parsing helpers for validator responses
//!
//! Model responses often wrap the JSON payload in prose or markdown fences.
//! These helpers locate the outermost JSON array and deserialize it against
//! the strict response schema.

use crate::error::{Error, Result};

use super::types::ValidatedSubscription;

/// Extract and parse the JSON array from a validator response.
///
/// Any schema deviation fails the whole batch; the caller falls back to the
/// local statistics for that batch.
pub fn parse_validation_response(response: &str) -> Result<Vec<ValidatedSubscription>> {
    let response = response.trim();

    let start = response.find('[');
    let end = response.rfind(']');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|err| {
                Error::Validation(format!(
                    "invalid JSON from validator: {} | Raw: {}",
                    err,
                    truncate_raw(json_str)
                ))
            })
        }
        _ => Err(Error::Validation(format!(
            "no JSON array found in validator response | Raw: {}",
            truncate_raw(response)
        ))),
    }
}

/// Cut an overlong raw payload for error messages, backing off to the
/// previous char boundary so multibyte text never splits mid-character.
fn truncate_raw(s: &str) -> String {
    const MAX: usize = 200;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
