//! Upload decoding: bytes plus filename → [`RawTable`].

use std::path::Path;

use tally_recon::{CellValue, RawTable};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("unsupported file format '{0}' (expected xlsx, xlsm, xls, xlsb, ods or csv)")]
    UnsupportedFormat(String),
    #[error("cannot read {format} file: {message}")]
    Parse { format: &'static str, message: String },
    #[error("no header row found")]
    Empty,
}

/// Decoder chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Xls,
    Xlsb,
    Ods,
    Csv,
}

impl TableFormat {
    pub fn from_filename(filename: &str) -> Result<Self, TableError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(Self::Xlsx),
            "xls" => Ok(Self::Xls),
            "xlsb" => Ok(Self::Xlsb),
            "ods" => Ok(Self::Ods),
            "csv" => Ok(Self::Csv),
            _ => Err(TableError::UnsupportedFormat(if ext.is_empty() {
                filename.to_string()
            } else {
                ext
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Xlsb => "xlsb",
            Self::Ods => "ods",
            Self::Csv => "csv",
        }
    }
}

/// Decode an uploaded file. The first non-empty row is the header; data
/// rows are padded or cut to the header width.
pub fn read_table(bytes: &[u8], filename: &str) -> Result<RawTable, TableError> {
    let format = TableFormat::from_filename(filename)?;
    let rows = match format {
        TableFormat::Csv => crate::csv::read_rows(bytes)?,
        _ => crate::xlsx::read_rows(bytes, format)?,
    };
    let table = into_table(rows)?;
    tracing::debug!(
        filename,
        format = format.name(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "decoded table"
    );
    Ok(table)
}

fn into_table(rows: Vec<Vec<CellValue>>) -> Result<RawTable, TableError> {
    let mut iter = rows.into_iter().skip_while(|r| r.iter().all(CellValue::is_blank));
    let header_row = iter.next().ok_or(TableError::Empty)?;

    let headers: Vec<String> = header_row.iter().map(header_text).collect();
    let width = headers.len();

    let mut table = RawTable::new(headers);
    for mut row in iter {
        row.resize(width, CellValue::Empty);
        table.push_row(row);
    }
    Ok(table)
}

fn header_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        // coerce_text never fails on non-empty numbers and dates
        other => tally_recon::normalize::coerce_text(other).unwrap_or_default(),
    }
}
