//! Upload pipeline: raw table → canonical records → one committed batch.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use crate::error::{DuplicateId, FormatError, IngestError};
use crate::mapper::{map_columns, normalize_header, CanonicalField, ColumnAliases, ColumnMap};
use crate::model::{Batch, DuplicatePolicy, NewTransaction, Status};
use crate::normalize::{coerce_amount, coerce_date, coerce_text, CellValue, ISO_FORMAT};
use crate::store::BatchStore;

static EMPTY: CellValue = CellValue::Empty;

/// Decoded tabular input: one header row and data rows of typed cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub aliases: ColumnAliases,
    pub duplicates: DuplicatePolicy,
}

pub struct Ingestor {
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Normalize `table` in full, then persist it as one batch in a single
    /// unit of work. Nothing is written unless every row normalizes.
    pub fn ingest<S: BatchStore>(
        &self,
        store: &mut S,
        table: &RawTable,
        filename: &str,
    ) -> Result<Batch, IngestError> {
        let records = self.normalize(table)?;

        store.begin().map_err(IngestError::Storage)?;
        match write_batch(store, filename, &records) {
            Ok(batch) => {
                tracing::info!(
                    batch = %batch.id,
                    filename,
                    records = batch.transactions.len(),
                    "batch committed"
                );
                Ok(batch)
            }
            Err(e) => {
                tracing::warn!(filename, error = %e, "rolling back upload");
                if let Err(rb) = store.rollback() {
                    tracing::warn!(error = %rb, "rollback failed");
                }
                Err(IngestError::Storage(e))
            }
        }
    }

    /// Map columns and normalize every non-blank row. Row numbers in errors
    /// are 1-based over data rows.
    pub fn normalize(&self, table: &RawTable) -> Result<Vec<NewTransaction>, IngestError> {
        let columns = map_columns(&table.headers, &self.options.aliases)?;
        let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

        let mut records = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            if row.iter().all(CellValue::is_blank) {
                continue;
            }
            records.push(normalize_row(row, i + 1, &headers, &columns)?);
        }

        if self.options.duplicates == DuplicatePolicy::Reject {
            let dups = find_duplicates(&records);
            if !dups.is_empty() {
                return Err(IngestError::DuplicateIds(dups));
            }
        }

        Ok(records)
    }
}

fn write_batch<S: BatchStore>(
    store: &mut S,
    filename: &str,
    records: &[NewTransaction],
) -> Result<Batch, crate::error::StoreError> {
    let created_at = Utc::now();
    let id = store.create_batch(filename, created_at)?;
    let transactions = store.append_records(id, records)?;
    store.commit()?;
    Ok(Batch {
        id,
        filename: filename.to_string(),
        created_at,
        transactions,
    })
}

fn normalize_row(
    row: &[CellValue],
    row_number: usize,
    headers: &[String],
    columns: &ColumnMap,
) -> Result<NewTransaction, IngestError> {
    let cell = |field: CanonicalField| row.get(columns.index(field)).unwrap_or(&EMPTY);
    let fail = |field: CanonicalField, source: FormatError| IngestError::Row {
        row: row_number,
        column: headers[columns.index(field)].clone(),
        source,
    };

    let business_id = coerce_text(cell(CanonicalField::BusinessId)).map_err(|e| fail(CanonicalField::BusinessId, e))?;
    let occurred_at = coerce_date(cell(CanonicalField::OccurredAt)).map_err(|e| fail(CanonicalField::OccurredAt, e))?;
    let source_account =
        coerce_text(cell(CanonicalField::SourceAccount)).map_err(|e| fail(CanonicalField::SourceAccount, e))?;
    let destination_account = coerce_text(cell(CanonicalField::DestinationAccount))
        .map_err(|e| fail(CanonicalField::DestinationAccount, e))?;
    let amount = coerce_amount(cell(CanonicalField::Amount)).map_err(|e| fail(CanonicalField::Amount, e))?;
    let status = coerce_text(cell(CanonicalField::Status))
        .and_then(|s| Status::parse(&s))
        .map_err(|e| fail(CanonicalField::Status, e))?;

    // Audit copy of every column; the mapped date and amount keep their
    // normalized forms.
    let mut raw_attributes = BTreeMap::new();
    for (col, header) in headers.iter().enumerate() {
        let value = match columns.field_at(col) {
            Some(CanonicalField::OccurredAt) => serde_json::Value::String(occurred_at.format(ISO_FORMAT).to_string()),
            Some(CanonicalField::Amount) => serde_json::Value::String(amount.to_string()),
            _ => row.get(col).map(CellValue::to_json).unwrap_or(serde_json::Value::Null),
        };
        raw_attributes.insert(header.clone(), value);
    }

    Ok(NewTransaction {
        business_id,
        occurred_at,
        source_account,
        destination_account,
        amount,
        status,
        raw_attributes,
    })
}

fn find_duplicates(records: &[NewTransaction]) -> Vec<DuplicateId> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for r in records {
        let n = counts.entry(r.business_id.as_str()).or_insert(0);
        if *n == 0 {
            order.push(r.business_id.as_str());
        }
        *n += 1;
    }
    order
        .into_iter()
        .filter(|id| counts[id] > 1)
        .map(|id| DuplicateId {
            side: None,
            business_id: id.to_string(),
            count: counts[id],
        })
        .collect()
}
