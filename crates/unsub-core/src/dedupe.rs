//! Result deduplication
//!
//! The detector and the validator can both emit entries for the same
//! real-world service under different names ("Netflix" from the vocabulary,
//! "Netflix International" from the validator). Entries are bucketed by
//! canonical service name; each bucket keeps its single most expensive entry.

use std::collections::HashMap;

use tracing::debug;

use crate::models::DetectedSubscription;
use crate::normalize::known_service;

/// Collapse duplicate subscriptions that map to the same canonical service.
///
/// Within a bucket the entry with the highest `average_amount` wins (plan
/// tiers: the most expensive observed plan is the one still being paid) and
/// is renamed to the canonical service name. Merchants outside the
/// known-service vocabulary bucket by their own name and pass through.
pub fn dedupe_subscriptions(subscriptions: Vec<DetectedSubscription>) -> Vec<DetectedSubscription> {
    let before = subscriptions.len();
    let mut buckets: HashMap<String, Vec<DetectedSubscription>> = HashMap::new();

    for sub in subscriptions {
        let key = match known_service(&sub.beneficiary) {
            Some((canonical, _)) => canonical.to_string(),
            None => sub.beneficiary.clone(),
        };
        buckets.entry(key).or_default().push(sub);
    }

    let mut result: Vec<DetectedSubscription> = buckets
        .into_iter()
        .filter_map(|(canonical, mut entries)| {
            if entries.len() == 1 {
                return entries.pop();
            }
            let mut best = entries.into_iter().max_by(|a, b| {
                a.average_amount
                    .partial_cmp(&b.average_amount)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            best.beneficiary = canonical;
            Some(best)
        })
        .collect();

    // Stable output order for clients
    result.sort_by(|a, b| a.beneficiary.cmp(&b.beneficiary));

    if result.len() != before {
        debug!(before, after = result.len(), "deduplicated subscriptions");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;

    fn sub(beneficiary: &str, amount: f64) -> DetectedSubscription {
        DetectedSubscription {
            beneficiary: beneficiary.to_string(),
            average_amount: amount,
            currency: "RON".to_string(),
            frequency: Frequency::Monthly,
            confidence: 0.9,
            transactions: Vec::new(),
            last_transaction_date: "2024-03-01".parse().unwrap(),
            next_estimated_payment: "2024-03-31".parse().unwrap(),
            total_paid_amount: amount * 12.0,
            category: None,
        }
    }

    #[test]
    fn test_same_service_keeps_most_expensive() {
        let result = dedupe_subscriptions(vec![
            sub("NETFLIX.COM", 45.0),
            sub("Netflix International", 65.0),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].beneficiary, "Netflix");
        assert_eq!(result[0].average_amount, 65.0);
    }

    #[test]
    fn test_distinct_services_pass_through() {
        let result = dedupe_subscriptions(vec![
            sub("Netflix", 45.0),
            sub("Spotify", 19.99),
            sub("Corner Gym", 120.0),
        ]);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_singleton_bucket_keeps_original_name() {
        let result = dedupe_subscriptions(vec![sub("NETFLIX.COM", 45.0)]);
        assert_eq!(result.len(), 1);
        // Not renamed when there is nothing to merge
        assert_eq!(result[0].beneficiary, "NETFLIX.COM");
    }

    #[test]
    fn test_unknown_merchants_bucket_by_own_name() {
        let result = dedupe_subscriptions(vec![
            sub("Corner Gym", 120.0),
            sub("Corner Gym", 130.0),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].average_amount, 130.0);
    }
}
