//! Recurring-charge pattern detection
//!
//! Takes the flat transaction list from the parser or importer, clusters it
//! by merchant and scores each cluster for subscription-likeness. Scoring is
//! additive out of 100: regularity of the intervals, consistency of the
//! amounts and closeness to an ideal billing cadence each contribute a
//! weighted bonus.
//!
//! The two ingestion paths are scored differently on purpose. CSV rows are
//! precise, so they get the four-way frequency classifier and a higher
//! acceptance bar. PDF text is noisy after extraction, so that path uses a
//! simplified binary classifier and a lower bar.

use chrono::Duration;
use tracing::debug;

use crate::models::{
    DetectedSubscription, Frequency, MerchantGroup, SubscriptionCandidate, Transaction,
    TransactionKind,
};
use crate::normalize::{known_service, normalize_merchant, same_merchant};

/// Which ingestion path produced the transactions being scored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Csv,
    Pdf,
}

/// Scoring weights and acceptance thresholds
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Points per observed transaction for the recurrence base score
    pub base_points_per_transaction: u8,
    /// Cap on the recurrence base score
    pub base_points_cap: u8,
    /// Bonus when amounts are consistent across the group
    pub amount_consistency_bonus: u8,
    /// Bonus when intervals are consistent across the group
    pub interval_consistency_bonus: u8,
    /// Maximum bonus for a mean interval close to the frequency's ideal
    pub ideal_proximity_bonus: u8,
    /// Points per transaction beyond the second
    pub extra_transaction_points: u8,
    /// Cap on the extra-transaction bonus
    pub extra_transaction_cap: u8,

    /// Allowed relative spread below the maximum amount for merchants
    /// outside the known-service vocabulary
    pub amount_variance: f64,
    /// Interval deviation from the mean tolerated on the PDF path (days)
    pub pdf_interval_tolerance_days: f64,

    /// Minimum confidence to accept a candidate from CSV input
    pub csv_min_confidence: u8,
    /// Minimum confidence to accept a candidate from PDF input
    pub pdf_min_confidence: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            base_points_per_transaction: 10,
            base_points_cap: 30,
            amount_consistency_bonus: 25,
            interval_consistency_bonus: 20,
            ideal_proximity_bonus: 15,
            extra_transaction_points: 5,
            extra_transaction_cap: 10,
            amount_variance: 0.05,
            pdf_interval_tolerance_days: 15.0,
            csv_min_confidence: 50,
            pdf_min_confidence: 40,
        }
    }
}

/// Billing cadence bands for the CSV path.
///
/// A mean interval outside every band means the cluster has no recognizable
/// cadence and is rejected.
const FREQUENCY_BANDS: &[(Frequency, f64, f64, f64)] = &[
    // (frequency, lower, upper, ideal)
    (Frequency::Weekly, 6.0, 8.0, 7.0),
    (Frequency::Monthly, 28.0, 35.0, 30.0),
    (Frequency::Bimonthly, 55.0, 65.0, 60.0),
    (Frequency::Quarterly, 85.0, 95.0, 90.0),
];

/// Partition transactions into merchant clusters.
///
/// Every transaction lands in exactly one group. Cluster membership uses the
/// normalizer plus the fuzzy [`same_merchant`] join, so "NETFLIX.COM" and
/// "Netflix International B.V." end up together. Known-service canonical
/// names take precedence as the cluster's display name.
pub fn group_transactions(transactions: &[Transaction]) -> Vec<MerchantGroup> {
    let mut groups: Vec<MerchantGroup> = Vec::new();

    for tx in transactions {
        let normalized = normalize_merchant(&tx.beneficiary);

        match groups
            .iter_mut()
            .find(|g| same_merchant(&g.normalized_merchant, &normalized.name))
        {
            Some(group) => {
                // A known-service canonical upgrades the cluster name
                if known_service(&normalized.name).is_some()
                    && group.normalized_merchant != normalized.name
                {
                    group.normalized_merchant = normalized.name;
                }
                if !group.raw_merchants.contains(&tx.beneficiary) {
                    group.raw_merchants.push(tx.beneficiary.clone());
                }
                group.transactions.push(tx.clone());
            }
            None => {
                groups.push(MerchantGroup {
                    normalized_merchant: normalized.name,
                    transactions: vec![tx.clone()],
                    raw_merchants: vec![tx.beneficiary.clone()],
                });
            }
        }
    }

    for group in groups.iter_mut() {
        group.transactions.sort_by_key(|t| t.date);
    }

    debug!(
        transactions = transactions.len(),
        groups = groups.len(),
        "grouped transactions by merchant"
    );

    groups
}

/// Score merchant clusters and keep the ones that look like subscriptions.
pub fn detect_candidates(
    groups: Vec<MerchantGroup>,
    source: DetectionSource,
    config: &DetectionConfig,
) -> Vec<SubscriptionCandidate> {
    let threshold = match source {
        DetectionSource::Csv => config.csv_min_confidence,
        DetectionSource::Pdf => config.pdf_min_confidence,
    };

    let mut candidates = Vec::new();

    for group in groups {
        let Some(candidate) = score_group(group, source, config) else {
            continue;
        };
        if candidate.confidence >= threshold {
            debug!(
                merchant = %candidate.group.normalized_merchant,
                confidence = candidate.confidence,
                frequency = %candidate.frequency,
                "accepted subscription candidate"
            );
            candidates.push(candidate);
        } else {
            debug!(
                merchant = %candidate.group.normalized_merchant,
                confidence = candidate.confidence,
                threshold,
                "rejected low-confidence candidate"
            );
        }
    }

    candidates
}

/// Score one cluster. `None` means the cluster cannot be a subscription at
/// all (too few charges, excluded merchant, no recognizable cadence).
fn score_group(
    group: MerchantGroup,
    source: DetectionSource,
    config: &DetectionConfig,
) -> Option<SubscriptionCandidate> {
    // Only outgoing money can be a subscription
    let debits: Vec<&Transaction> = group
        .transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Debit)
        .collect();
    if debits.len() < 2 {
        return None;
    }

    let first_raw = group.raw_merchants.first().map(String::as_str)?;
    if crate::normalize::is_excluded(first_raw)
        || crate::normalize::is_excluded(&group.normalized_merchant)
    {
        return None;
    }

    let known = known_service(&group.normalized_merchant);

    let amounts: Vec<f64> = debits.iter().map(|t| t.amount).collect();
    let max_amount = amounts.iter().cloned().fold(f64::MIN, f64::max);
    if max_amount <= 0.0 {
        return None;
    }

    // Unknown merchants must keep their amounts near the maximum; known
    // subscription brands get a pass because plan changes and add-ons make
    // their amounts legitimately uneven.
    let amounts_within_variance = amounts
        .iter()
        .all(|a| (max_amount - a) / max_amount <= config.amount_variance);
    if known.is_none() && !amounts_within_variance {
        return None;
    }

    let intervals: Vec<i64> = debits
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days())
        .collect();
    let mean_interval = intervals.iter().sum::<i64>() as f64 / intervals.len() as f64;
    if mean_interval <= 0.0 {
        return None;
    }

    let (frequency, ideal, intervals_consistent) = match source {
        DetectionSource::Csv => {
            let (frequency, lower, upper, ideal) = FREQUENCY_BANDS
                .iter()
                .find(|(_, lower, upper, _)| mean_interval >= *lower && mean_interval <= *upper)
                .copied()?;
            let consistent = intervals
                .iter()
                .all(|&d| (d as f64) >= lower && (d as f64) <= upper);
            (frequency, ideal, consistent)
        }
        DetectionSource::Pdf => {
            let frequency = if mean_interval <= 14.0 {
                Frequency::Weekly
            } else {
                Frequency::Monthly
            };
            let ideal = frequency.interval_days() as f64;
            let consistent = intervals
                .iter()
                .all(|&d| (d as f64 - mean_interval).abs() <= config.pdf_interval_tolerance_days);
            (frequency, ideal, consistent)
        }
    };

    let mut score: u32 = 0;
    score += (debits.len() as u32 * config.base_points_per_transaction as u32)
        .min(config.base_points_cap as u32);
    if amounts_within_variance {
        score += config.amount_consistency_bonus as u32;
    }
    if intervals_consistent {
        score += config.interval_consistency_bonus as u32;
    }

    let proximity = 1.0 - ((mean_interval - ideal).abs() / ideal).min(1.0);
    score += (config.ideal_proximity_bonus as f64 * proximity).round() as u32;

    let extra = debits.len().saturating_sub(2) as u32;
    score += (extra * config.extra_transaction_points as u32)
        .min(config.extra_transaction_cap as u32);

    let confidence = score.min(100) as u8;

    let last_transaction_date = debits.last().map(|t| t.date)?;
    let currency = debits
        .first()
        .map(|t| t.currency.clone())
        .unwrap_or_default();
    let category = known.map(|(_, c)| c.to_string());

    Some(SubscriptionCandidate {
        average_amount: max_amount,
        currency,
        average_interval_days: mean_interval,
        frequency,
        confidence,
        last_transaction_date,
        category,
        group,
    })
}

/// Project a candidate into the externally-visible result shape.
///
/// The next payment estimate is always strictly after the last observed
/// charge; the annual total uses the frequency's charges-per-year.
pub fn candidate_to_subscription(candidate: SubscriptionCandidate) -> DetectedSubscription {
    let next_estimated_payment =
        candidate.last_transaction_date + Duration::days(candidate.frequency.interval_days());
    let total_paid_amount = candidate.average_amount * candidate.frequency.per_year();

    DetectedSubscription {
        beneficiary: candidate.group.normalized_merchant.clone(),
        average_amount: candidate.average_amount,
        currency: candidate.currency,
        frequency: candidate.frequency,
        confidence: candidate.confidence as f64 / 100.0,
        transactions: candidate.group.transactions,
        last_transaction_date: candidate.last_transaction_date,
        next_estimated_payment,
        total_paid_amount,
        category: candidate.category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(date: &str, amount: f64, beneficiary: &str) -> Transaction {
        Transaction {
            date: date.parse().unwrap(),
            amount,
            currency: "RON".to_string(),
            beneficiary: beneficiary.to_string(),
            description: beneficiary.to_string(),
            kind: TransactionKind::Debit,
        }
    }

    #[test]
    fn test_grouping_is_a_partition() {
        let txs = vec![
            tx("2024-01-01", 45.0, "NETFLIX.COM"),
            tx("2024-02-01", 45.0, "Netflix International B.V."),
            tx("2024-01-15", 19.99, "SPOTIFY AB"),
            tx("2024-01-20", 120.0, "RANDOM SHOP SRL"),
        ];
        let groups = group_transactions(&txs);
        let total: usize = groups.iter().map(|g| g.transactions.len()).sum();
        assert_eq!(total, txs.len());
        // Netflix variants clustered together
        let netflix = groups
            .iter()
            .find(|g| g.normalized_merchant == "Netflix")
            .unwrap();
        assert_eq!(netflix.transactions.len(), 2);
        assert_eq!(netflix.raw_merchants.len(), 2);
    }

    #[test]
    fn test_group_transactions_sorted_by_date() {
        let txs = vec![
            tx("2024-03-01", 45.0, "NETFLIX.COM"),
            tx("2024-01-01", 45.0, "NETFLIX.COM"),
            tx("2024-02-01", 45.0, "NETFLIX.COM"),
        ];
        let groups = group_transactions(&txs);
        let dates: Vec<_> = groups[0].transactions.iter().map(|t| t.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_monthly_csv_scenario_accepted() {
        let txs = vec![
            tx("2024-01-05", 45.0, "NETFLIX.COM"),
            tx("2024-02-05", 45.0, "NETFLIX.COM"),
            tx("2024-03-05", 45.0, "NETFLIX.COM"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.frequency, Frequency::Monthly);
        assert!(c.confidence >= 50);
        assert_eq!(c.average_amount, 45.0);
    }

    #[test]
    fn test_single_transaction_rejected() {
        let txs = vec![tx("2024-01-05", 45.0, "NETFLIX.COM")];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_excluded_merchant_never_becomes_candidate() {
        let txs = vec![
            tx("2024-01-05", 60.0, "ORANGE ROMANIA SA"),
            tx("2024-02-05", 60.0, "ORANGE ROMANIA SA"),
            tx("2024-03-05", 60.0, "ORANGE ROMANIA SA"),
        ];
        let groups = group_transactions(&txs);
        // Still grouped (the partition holds), just never a candidate
        assert_eq!(groups.len(), 1);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_known_brand_tolerates_variable_amounts() {
        // Plan upgrade mid-history: unknown merchants would be rejected,
        // Spotify is in the known-service vocabulary so it passes.
        let txs = vec![
            tx("2024-01-10", 19.99, "SPOTIFY AB"),
            tx("2024-02-10", 19.99, "SPOTIFY AB"),
            tx("2024-03-10", 29.99, "SPOTIFY AB"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert_eq!(candidates.len(), 1);
        // Representative amount is the maximum observed
        assert_eq!(candidates[0].average_amount, 29.99);
        assert!(candidates[0].confidence >= 50);
    }

    #[test]
    fn test_unknown_merchant_variable_amounts_rejected() {
        let txs = vec![
            tx("2024-01-10", 19.99, "CORNER GYM CENTER"),
            tx("2024-02-10", 45.50, "CORNER GYM CENTER"),
            tx("2024-03-10", 80.00, "CORNER GYM CENTER"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_irregular_intervals_rejected_on_csv_path() {
        // Mean interval ~20 days falls outside every cadence band
        let txs = vec![
            tx("2024-01-01", 45.0, "SOME SERVICE"),
            tx("2024-01-06", 45.0, "SOME SERVICE"),
            tx("2024-02-10", 45.0, "SOME SERVICE"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_pdf_path_binary_frequency() {
        let txs = vec![
            tx("2024-01-01", 45.0, "NETFLIX.COM"),
            tx("2024-01-08", 45.0, "NETFLIX.COM"),
            tx("2024-01-15", 45.0, "NETFLIX.COM"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Pdf, &DetectionConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].frequency, Frequency::Weekly);
    }

    #[test]
    fn test_pdf_path_accepts_looser_cadence() {
        // ~20-day cadence: rejected on the CSV path, monthly on the PDF path
        let txs = vec![
            tx("2024-01-01", 45.0, "NETFLIX.COM"),
            tx("2024-01-21", 45.0, "NETFLIX.COM"),
            tx("2024-02-10", 45.0, "NETFLIX.COM"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Pdf, &DetectionConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].frequency, Frequency::Monthly);
        assert!(candidates[0].confidence >= 40);
    }

    #[test]
    fn test_confidence_never_exceeds_100() {
        let txs: Vec<Transaction> = (1..=12)
            .map(|m| tx(&format!("2024-{:02}-05", m), 45.0, "NETFLIX.COM"))
            .collect();
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence <= 100);
    }

    #[test]
    fn test_next_payment_strictly_after_last() {
        let txs = vec![
            tx("2024-01-05", 45.0, "NETFLIX.COM"),
            tx("2024-02-05", 45.0, "NETFLIX.COM"),
            tx("2024-03-05", 45.0, "NETFLIX.COM"),
        ];
        let groups = group_transactions(&txs);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        let sub = candidate_to_subscription(candidates.into_iter().next().unwrap());
        assert!(sub.next_estimated_payment > sub.last_transaction_date);
        assert_eq!(
            sub.next_estimated_payment,
            NaiveDate::from_ymd_opt(2024, 4, 4).unwrap()
        );
        assert_eq!(sub.total_paid_amount, 45.0 * 12.0);
    }

    #[test]
    fn test_credits_do_not_form_subscriptions() {
        let mut refund = tx("2024-01-05", 45.0, "NETFLIX.COM");
        refund.kind = TransactionKind::Credit;
        let mut refund2 = tx("2024-02-05", 45.0, "NETFLIX.COM");
        refund2.kind = TransactionKind::Credit;
        let groups = group_transactions(&[refund, refund2]);
        let candidates =
            detect_candidates(groups, DetectionSource::Csv, &DetectionConfig::default());
        assert!(candidates.is_empty());
    }
}
