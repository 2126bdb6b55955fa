use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Storage surrogate key of an uploaded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub i64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One uploaded file and its line items.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: BatchId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub transactions: Vec<TransactionRecord>,
}

/// Batch header without its line items, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub id: BatchId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub transaction_count: usize,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Successful,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "Successful",
            Self::Failed => "Failed",
        }
    }

    /// Accepts the canonical names and their common spellings, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, FormatError> {
        match raw.trim().to_lowercase().as_str() {
            "successful" | "success" | "exitosa" => Ok(Self::Successful),
            "failed" | "failure" | "fallida" => Ok(Self::Failed),
            _ => Err(FormatError::Status(raw.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized line item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub business_id: String,
    pub occurred_at: NaiveDateTime,
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    pub status: Status,
    pub raw_attributes: BTreeMap<String, serde_json::Value>,
}

impl NewTransaction {
    pub fn into_record(self, id: i64, batch_id: BatchId) -> TransactionRecord {
        TransactionRecord {
            id,
            batch_id,
            business_id: self.business_id,
            occurred_at: self.occurred_at,
            source_account: self.source_account,
            destination_account: self.destination_account,
            amount: self.amount,
            status: self.status,
            raw_attributes: self.raw_attributes,
        }
    }
}

/// A persisted line item. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub batch_id: BatchId,
    pub business_id: String,
    pub occurred_at: NaiveDateTime,
    pub source_account: String,
    pub destination_account: String,
    pub amount: Decimal,
    pub status: Status,
    pub raw_attributes: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// What to do when a business id repeats within one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later rows replace earlier ones; the id keeps its first position.
    #[default]
    LastWins,
    /// Later rows are ignored.
    FirstWins,
    /// Any repeated id is an error.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyReason {
    Amount,
    Status,
}

impl DiscrepancyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    ExactMatch,
    Discrepancy(DiscrepancyReason),
    OnlyInA,
    OnlyInB,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactMatch => write!(f, "exact_match"),
            Self::Discrepancy(reason) => write!(f, "discrepancy ({})", reason.as_str()),
            Self::OnlyInA => write!(f, "only_in_a"),
            Self::OnlyInB => write!(f, "only_in_b"),
        }
    }
}

/// One business id's outcome. Side-specific fields are `None` on the side
/// that lacks the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: MatchKind,
    pub business_id: String,
    pub occurred_at: NaiveDateTime,
    pub source_account: String,
    pub destination_account: String,
    pub amount_a: Option<Decimal>,
    pub amount_b: Option<Decimal>,
    pub status_a: Option<Status>,
    pub status_b: Option<Status>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub rows_a: usize,
    pub rows_b: usize,
    pub exact: usize,
    pub discrepant: usize,
    pub amount_discrepancies: usize,
    pub status_discrepancies: usize,
    pub only_a: usize,
    pub only_b: usize,
    /// Rows collapsed into an earlier id on each side.
    pub duplicates_a: usize,
    pub duplicates_b: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub exact: Vec<Classification>,
    pub discrepant: Vec<Classification>,
    pub only_a: Vec<Classification>,
    pub only_b: Vec<Classification>,
    pub summary: ReconSummary,
}

impl ReconResult {
    pub fn is_reconciled(&self) -> bool {
        self.discrepant.is_empty() && self.only_a.is_empty() && self.only_b.is_empty()
    }
}
