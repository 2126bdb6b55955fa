use thiserror::Error;

use crate::mapper::CanonicalField;
use crate::model::{BatchId, Side};

/// Boxed error returned by a [`crate::store::BatchStore`] implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single cell could not be coerced into its canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("cannot parse date '{0}'")]
    Date(String),
    #[error("cannot parse amount '{0}'")]
    Amount(String),
    #[error("unknown status '{0}' (expected Successful or Failed)")]
    Status(String),
    #[error("expected a date, found {0}")]
    NotADate(String),
    #[error("value is empty")]
    Empty,
}

/// A canonical field has no matching column in the input headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("no column found for '{field}' (tried: {})", .tried.join(", "))]
    MissingField { field: CanonicalField, tried: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateId {
    /// `None` when the duplicate was found within a single upload.
    pub side: Option<Side>,
    pub business_id: String,
    pub count: usize,
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("duplicate business ids: {}", format_duplicates(.0))]
    DuplicateIds(Vec<DuplicateId>),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("row {row}, column '{column}': {source}")]
    Row {
        row: usize,
        column: String,
        #[source]
        source: FormatError,
    },
    #[error("duplicate business ids: {}", format_duplicates(.0))]
    DuplicateIds(Vec<DuplicateId>),
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("batch not found: {}", format_ids(.0))]
    NotFound(Vec<BatchId>),
    #[error(transparent)]
    Recon(#[from] ReconError),
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl IngestError {
    /// True for failures caused by the uploaded content rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

fn format_duplicates(dups: &[DuplicateId]) -> String {
    dups.iter()
        .map(|d| match d.side {
            Some(side) => format!("{side} '{}' x{}", d.business_id, d.count),
            None => format!("'{}' x{}", d.business_id, d.count),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_ids(ids: &[BatchId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
