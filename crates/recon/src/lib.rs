//! `tally-recon`: transaction batch normalization and two-way reconciliation.
//!
//! Pure core: receives decoded tables, talks to persistence only through the
//! [`store::BatchStore`] port, returns classified results. No file or
//! database dependencies.

pub mod compare;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod mapper;
pub mod model;
pub mod normalize;
pub mod store;

pub use compare::compare;
pub use engine::reconcile;
pub use error::{CompareError, FormatError, IngestError, MappingError, ReconError, StoreError};
pub use ingest::{IngestOptions, Ingestor, RawTable};
pub use mapper::{CanonicalField, ColumnAliases};
pub use model::{
    Batch, BatchId, BatchSummary, Classification, DiscrepancyReason, DuplicatePolicy, MatchKind,
    NewTransaction, ReconResult, ReconSummary, Status, TransactionRecord,
};
pub use normalize::CellValue;
pub use store::{BatchStore, MemoryStore};
