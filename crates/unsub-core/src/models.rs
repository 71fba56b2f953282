//! Data model for one detection run
//!
//! Everything here is transient and request-scoped: values are produced and
//! consumed entirely within a single analysis invocation, nothing is
//! persisted by the core.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Direction of a financial movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debit,
    Credit,
}

/// One parsed financial movement
///
/// `amount` is always a positive magnitude; direction is carried by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: f64,
    /// ISO-like 3-letter code, already converted to the reporting currency
    /// when a foreign currency was detected inline in the source text.
    pub currency: String,
    /// Raw merchant text as it appeared in the statement
    pub beneficiary: String,
    /// Free-text context around the transaction
    pub description: String,
    pub kind: TransactionKind,
}

impl Transaction {
    /// Deduplication key over the (date, amount, beneficiary) triple.
    ///
    /// The parsing strategies are deliberately redundant, so the same
    /// movement is often found by more than one of them; this key collapses
    /// those hits. Amounts are keyed in cents to avoid float formatting noise.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.date.to_string().as_bytes());
        hasher.update(((self.amount * 100.0).round() as i64).to_be_bytes());
        hasher.update(self.beneficiary.to_uppercase().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Classified recurrence period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Bimonthly,
    Quarterly,
}

impl Frequency {
    /// Nominal days between charges, used for next-payment projection
    pub fn interval_days(&self) -> i64 {
        match self {
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Bimonthly => 60,
            Frequency::Quarterly => 90,
        }
    }

    /// Charges per year, used for the annualized total
    pub fn per_year(&self) -> f64 {
        match self {
            Frequency::Weekly => 52.0,
            Frequency::Monthly => 12.0,
            Frequency::Bimonthly => 6.0,
            Frequency::Quarterly => 4.0,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "bimonthly" => Ok(Frequency::Bimonthly),
            "quarterly" => Ok(Frequency::Quarterly),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

/// A cluster of transactions believed to share one real-world merchant
///
/// Grouping is a partition: every transaction of a run belongs to exactly
/// one group.
#[derive(Debug, Clone)]
pub struct MerchantGroup {
    /// Canonical display name for the cluster
    pub normalized_merchant: String,
    /// Member transactions, ordered by date
    pub transactions: Vec<Transaction>,
    /// Original raw strings observed for this cluster, for traceability
    pub raw_merchants: Vec<String>,
}

/// A merchant group annotated with derived statistics
///
/// Produced by the pattern detector, consumed by the validator and the
/// deduplicator.
#[derive(Debug, Clone)]
pub struct SubscriptionCandidate {
    pub group: MerchantGroup,
    /// Representative amount. When historical amounts vary this is the
    /// maximum observed, not the mean (surface the most expensive plan).
    pub average_amount: f64,
    pub currency: String,
    pub average_interval_days: f64,
    pub frequency: Frequency,
    /// Internal score, 0-100
    pub confidence: u8,
    pub last_transaction_date: NaiveDate,
    /// Best-effort classification from the known-service vocabulary
    pub category: Option<String>,
}

/// Final externally-visible detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSubscription {
    /// Canonical merchant name
    pub beneficiary: String,
    pub average_amount: f64,
    pub currency: String,
    pub frequency: Frequency,
    /// External score, 0.0-1.0 (scaled from the internal 0-100)
    pub confidence: f64,
    /// May be empty when the entry came from the validator-only path
    pub transactions: Vec<Transaction>,
    pub last_transaction_date: NaiveDate,
    /// Always strictly after `last_transaction_date`
    pub next_estimated_payment: NaiveDate,
    /// Projected annual-equivalent total
    pub total_paid_amount: f64,
    pub category: Option<String>,
}
