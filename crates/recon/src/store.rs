//! Storage port. The core talks to persistence only through [`BatchStore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Batch, BatchId, BatchSummary, NewTransaction, TransactionRecord};

/// Relational batch storage with an explicit unit of work.
///
/// `create_batch` and `append_records` are only valid between `begin` and
/// `commit`/`rollback`. Reads see committed state.
pub trait BatchStore {
    fn begin(&mut self) -> Result<(), StoreError>;

    fn create_batch(&mut self, filename: &str, created_at: DateTime<Utc>) -> Result<BatchId, StoreError>;

    /// Persist records under `batch`, returning them with their assigned ids.
    fn append_records(
        &mut self,
        batch: BatchId,
        records: &[NewTransaction],
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    fn load_batch_with_records(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    fn list_batches(&self) -> Result<Vec<BatchSummary>, StoreError>;

    /// Delete a batch and its records. Returns false if it did not exist.
    fn delete_batch(&mut self, id: BatchId) -> Result<bool, StoreError>;

    /// Records across all batches ordered by id.
    fn list_transactions(&self, skip: usize, limit: usize) -> Result<Vec<TransactionRecord>, StoreError>;

    fn get_transaction(&self, id: i64) -> Result<Option<TransactionRecord>, StoreError>;
}

/// In-process store. Holds everything in ordered maps; `begin` snapshots
/// state and `rollback` restores it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: BTreeMap<BatchId, Batch>,
    next_batch: i64,
    next_record: i64,
    snapshot: Option<Snapshot>,
}

#[derive(Debug)]
struct Snapshot {
    batches: BTreeMap<BatchId, Batch>,
    next_batch: i64,
    next_record: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    fn require_tx(&self) -> Result<(), StoreError> {
        if self.snapshot.is_none() {
            return Err("no transaction in progress".into());
        }
        Ok(())
    }
}

impl BatchStore for MemoryStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err("transaction already in progress".into());
        }
        self.snapshot = Some(Snapshot {
            batches: self.batches.clone(),
            next_batch: self.next_batch,
            next_record: self.next_record,
        });
        Ok(())
    }

    fn create_batch(&mut self, filename: &str, created_at: DateTime<Utc>) -> Result<BatchId, StoreError> {
        self.require_tx()?;
        self.next_batch += 1;
        let id = BatchId(self.next_batch);
        self.batches.insert(
            id,
            Batch {
                id,
                filename: filename.to_string(),
                created_at,
                transactions: Vec::new(),
            },
        );
        Ok(id)
    }

    fn append_records(
        &mut self,
        batch: BatchId,
        records: &[NewTransaction],
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.require_tx()?;
        let mut next = self.next_record;
        let target = self
            .batches
            .get_mut(&batch)
            .ok_or_else(|| format!("batch {batch} does not exist"))?;

        let stored: Vec<TransactionRecord> = records
            .iter()
            .cloned()
            .map(|r| {
                next += 1;
                r.into_record(next, batch)
            })
            .collect();
        target.transactions.extend(stored.iter().cloned());
        self.next_record = next;
        Ok(stored)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.require_tx()?;
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(snap) = self.snapshot.take() {
            self.batches = snap.batches;
            self.next_batch = snap.next_batch;
            self.next_record = snap.next_record;
        }
        Ok(())
    }

    fn load_batch_with_records(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.batches.get(&id).cloned())
    }

    fn list_batches(&self) -> Result<Vec<BatchSummary>, StoreError> {
        Ok(self
            .batches
            .values()
            .map(|b| BatchSummary {
                id: b.id,
                filename: b.filename.clone(),
                created_at: b.created_at,
                transaction_count: b.transactions.len(),
            })
            .collect())
    }

    fn delete_batch(&mut self, id: BatchId) -> Result<bool, StoreError> {
        Ok(self.batches.remove(&id).is_some())
    }

    fn list_transactions(&self, skip: usize, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut all: Vec<&TransactionRecord> = self.batches.values().flat_map(|b| &b.transactions).collect();
        all.sort_by_key(|r| r.id);
        Ok(all.into_iter().skip(skip).take(limit).cloned().collect())
    }

    fn get_transaction(&self, id: i64) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self
            .batches
            .values()
            .flat_map(|b| &b.transactions)
            .find(|r| r.id == id)
            .cloned())
    }
}
