//! Batch storage on SQLite.
//!
//! Amounts are stored as decimal TEXT and timestamps as ISO-8601 TEXT so
//! values read back compare equal to what was written.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tally_recon::{
    Batch, BatchId, BatchStore, BatchSummary, NewTransaction, Status, TransactionRecord,
};
use thiserror::Error;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    created_at TEXT NOT NULL               -- RFC 3339, UTC
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
    business_id TEXT NOT NULL,
    occurred_at TEXT NOT NULL,             -- ISO 8601, no zone
    source_account TEXT NOT NULL,
    destination_account TEXT NOT NULL,
    amount TEXT NOT NULL,                  -- exact decimal text
    status TEXT NOT NULL CHECK (status IN ('Successful', 'Failed')),
    raw_attributes TEXT NOT NULL           -- JSON object
);

CREATE INDEX IF NOT EXISTS idx_transactions_business_id ON transactions(business_id);
CREATE INDEX IF NOT EXISTS idx_transactions_batch_id ON transactions(batch_id);
"#;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const TRANSACTION_COLUMNS: &str = "id, batch_id, business_id, occurred_at, source_account, \
     destination_account, amount, status, raw_attributes";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid raw attributes: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // Connection::open fails on a missing directory
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn insert_batch(&self, filename: &str, created_at: DateTime<Utc>) -> Result<BatchId, StoreError> {
        self.conn.execute(
            "INSERT INTO batches (filename, created_at) VALUES (?1, ?2)",
            params![filename, created_at.to_rfc3339()],
        )?;
        Ok(BatchId(self.conn.last_insert_rowid()))
    }

    fn insert_records(
        &self,
        batch: BatchId,
        records: &[NewTransaction],
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO transactions (batch_id, business_id, occurred_at, source_account, \
             destination_account, amount, status, raw_attributes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        let mut stored = Vec::with_capacity(records.len());
        for r in records {
            stmt.execute(params![
                batch.0,
                r.business_id,
                r.occurred_at.format(TIMESTAMP_FORMAT).to_string(),
                r.source_account,
                r.destination_account,
                r.amount.to_string(),
                r.status.as_str(),
                serde_json::to_string(&r.raw_attributes)?,
            ])?;
            stored.push(r.clone().into_record(self.conn.last_insert_rowid(), batch));
        }
        Ok(stored)
    }

    fn select_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let header = self
            .conn
            .query_row(
                "SELECT filename, created_at FROM batches WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((filename, created_at)) = header else {
            return Ok(None);
        };

        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE batch_id = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id.0], StoredRow::from_row)?;
        let transactions = rows
            .map(|r| r.map_err(StoreError::from).and_then(StoredRow::decode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Batch {
            id,
            filename,
            created_at: parse_created_at(&created_at)?,
            transactions,
        }))
    }

    fn select_batches(&self) -> Result<Vec<BatchSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.filename, b.created_at, COUNT(t.id) \
             FROM batches b LEFT JOIN transactions t ON t.batch_id = b.id \
             GROUP BY b.id ORDER BY b.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, filename, created_at, count) = row?;
            out.push(BatchSummary {
                id: BatchId(id),
                filename,
                created_at: parse_created_at(&created_at)?,
                transaction_count: count as usize,
            });
        }
        Ok(out)
    }

    fn select_transactions(&self, skip: usize, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY id LIMIT ?1 OFFSET ?2");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![clamp(limit), clamp(skip)], StoredRow::from_row)?;
        let records = rows
            .map(|r| r.map_err(StoreError::from).and_then(StoredRow::decode))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn select_transaction(&self, id: i64) -> Result<Option<TransactionRecord>, StoreError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], StoredRow::from_row)
            .optional()?
            .map(StoredRow::decode)
            .transpose()
    }
}

impl BatchStore for SqliteStore {
    fn begin(&mut self) -> Result<(), tally_recon::StoreError> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn create_batch(
        &mut self,
        filename: &str,
        created_at: DateTime<Utc>,
    ) -> Result<BatchId, tally_recon::StoreError> {
        Ok(self.insert_batch(filename, created_at)?)
    }

    fn append_records(
        &mut self,
        batch: BatchId,
        records: &[NewTransaction],
    ) -> Result<Vec<TransactionRecord>, tally_recon::StoreError> {
        Ok(self.insert_records(batch, records)?)
    }

    fn commit(&mut self) -> Result<(), tally_recon::StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), tally_recon::StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn load_batch_with_records(&self, id: BatchId) -> Result<Option<Batch>, tally_recon::StoreError> {
        Ok(self.select_batch(id)?)
    }

    fn list_batches(&self) -> Result<Vec<BatchSummary>, tally_recon::StoreError> {
        Ok(self.select_batches()?)
    }

    fn delete_batch(&mut self, id: BatchId) -> Result<bool, tally_recon::StoreError> {
        let deleted = self.conn.execute("DELETE FROM batches WHERE id = ?1", params![id.0])?;
        if deleted > 0 {
            tracing::info!(batch = %id, "batch deleted");
        }
        Ok(deleted > 0)
    }

    fn list_transactions(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, tally_recon::StoreError> {
        Ok(self.select_transactions(skip, limit)?)
    }

    fn get_transaction(&self, id: i64) -> Result<Option<TransactionRecord>, tally_recon::StoreError> {
        Ok(self.select_transaction(id)?)
    }
}

/// Column values as stored, before decoding into domain types.
struct StoredRow {
    id: i64,
    batch_id: i64,
    business_id: String,
    occurred_at: String,
    source_account: String,
    destination_account: String,
    amount: String,
    status: String,
    raw_attributes: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            batch_id: row.get(1)?,
            business_id: row.get(2)?,
            occurred_at: row.get(3)?,
            source_account: row.get(4)?,
            destination_account: row.get(5)?,
            amount: row.get(6)?,
            status: row.get(7)?,
            raw_attributes: row.get(8)?,
        })
    }

    fn decode(self) -> Result<TransactionRecord, StoreError> {
        let occurred_at = NaiveDateTime::parse_from_str(&self.occurred_at, TIMESTAMP_FORMAT).map_err(|_| {
            StoreError::Corrupt {
                column: "occurred_at",
                value: self.occurred_at.clone(),
            }
        })?;
        let amount = Decimal::from_str(&self.amount).map_err(|_| StoreError::Corrupt {
            column: "amount",
            value: self.amount.clone(),
        })?;
        let status = Status::parse(&self.status).map_err(|_| StoreError::Corrupt {
            column: "status",
            value: self.status.clone(),
        })?;
        let raw_attributes: BTreeMap<String, serde_json::Value> = serde_json::from_str(&self.raw_attributes)?;

        Ok(TransactionRecord {
            id: self.id,
            batch_id: BatchId(self.batch_id),
            business_id: self.business_id,
            occurred_at,
            source_account: self.source_account,
            destination_account: self.destination_account,
            amount,
            status,
            raw_attributes,
        })
    }
}

fn parse_created_at(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column: "created_at",
            value: value.to_string(),
        })
}

fn clamp(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
