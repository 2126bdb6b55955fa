//! Comparison report as a multi-sheet xlsx workbook.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use tally_recon::normalize::ISO_FORMAT;
use tally_recon::{BatchId, Classification, MatchKind, ReconResult, Status};
use thiserror::Error;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const EXACT_SHEET: &str = "Exact Matches";
pub const DISCREPANCY_SHEET: &str = "Discrepancies";
pub const SUMMARY_SHEET: &str = "Summary";

const RECORD_HEADERS: [&str; 6] = [
    "business_id",
    "date",
    "source_account",
    "destination_account",
    "amount",
    "status",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot build report: {0}")]
    Xlsx(#[from] XlsxError),
}

/// A rendered report, ready for download.
#[derive(Debug, Clone)]
pub struct Report {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

pub fn only_sheet_name(id: BatchId) -> String {
    let name = format!("Only in Batch {id}");
    if name.len() <= MAX_SHEET_NAME {
        name
    } else {
        format!("Only in {id}")
    }
}

pub fn report_filename(id_a: BatchId, id_b: BatchId) -> String {
    format!("comparison_{id_a}_{id_b}.xlsx")
}

struct Formats {
    header: Format,
    date: Format,
    amount: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            amount: Format::new().set_num_format("0.00"),
        }
    }
}

/// Render the four buckets, one sheet per non-empty bucket. A workbook
/// with nothing to show gets a summary sheet instead.
pub fn render(result: &ReconResult, id_a: BatchId, id_b: BatchId) -> Result<Report, ReportError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    if !result.exact.is_empty() {
        let ws = workbook.add_worksheet().set_name(EXACT_SHEET)?;
        write_records(ws, &formats, &result.exact, Side::A)?;
    }

    if !result.discrepant.is_empty() {
        let ws = workbook.add_worksheet().set_name(DISCREPANCY_SHEET)?;
        write_discrepancies(ws, &formats, &result.discrepant, id_a, id_b)?;
    }

    if !result.only_a.is_empty() {
        let ws = workbook.add_worksheet().set_name(only_sheet_name(id_a))?;
        write_records(ws, &formats, &result.only_a, Side::A)?;
    }

    if !result.only_b.is_empty() {
        let ws = workbook.add_worksheet().set_name(only_sheet_name(id_b))?;
        write_records(ws, &formats, &result.only_b, Side::B)?;
    }

    if result.exact.is_empty()
        && result.discrepant.is_empty()
        && result.only_a.is_empty()
        && result.only_b.is_empty()
    {
        let ws = workbook.add_worksheet().set_name(SUMMARY_SHEET)?;
        write_summary(ws, &formats, result)?;
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(bytes = bytes.len(), "rendered report");

    Ok(Report {
        bytes,
        content_type: XLSX_CONTENT_TYPE,
        filename: report_filename(id_a, id_b),
    })
}

#[derive(Clone, Copy)]
enum Side {
    A,
    B,
}

fn write_header<S: AsRef<str>>(ws: &mut Worksheet, formats: &Formats, headers: &[S]) -> Result<(), XlsxError> {
    for (col, h) in headers.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, h.as_ref(), &formats.header)?;
        ws.set_column_width(col as u16, 20)?;
    }
    Ok(())
}

fn write_records(
    ws: &mut Worksheet,
    formats: &Formats,
    rows: &[Classification],
    side: Side,
) -> Result<(), XlsxError> {
    write_header(ws, formats, &RECORD_HEADERS)?;
    for (i, c) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        let (amount, status) = match side {
            Side::A => (c.amount_a, c.status_a),
            Side::B => (c.amount_b, c.status_b),
        };
        write_identity(ws, formats, row, c)?;
        write_amount(ws, formats, row, 4, amount)?;
        write_status(ws, row, 5, status)?;
    }
    Ok(())
}

fn write_discrepancies(
    ws: &mut Worksheet,
    formats: &Formats,
    rows: &[Classification],
    id_a: BatchId,
    id_b: BatchId,
) -> Result<(), XlsxError> {
    let headers = [
        "business_id".to_string(),
        "date".to_string(),
        "source_account".to_string(),
        "destination_account".to_string(),
        format!("amount_batch_{id_a}"),
        format!("amount_batch_{id_b}"),
        format!("status_batch_{id_a}"),
        format!("status_batch_{id_b}"),
        "reason".to_string(),
    ];
    write_header(ws, formats, &headers)?;

    for (i, c) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        write_identity(ws, formats, row, c)?;
        write_amount(ws, formats, row, 4, c.amount_a)?;
        write_amount(ws, formats, row, 5, c.amount_b)?;
        write_status(ws, row, 6, c.status_a)?;
        write_status(ws, row, 7, c.status_b)?;
        if let MatchKind::Discrepancy(reason) = c.kind {
            ws.write_string(row, 8, reason.as_str())?;
        }
    }
    Ok(())
}

fn write_summary(ws: &mut Worksheet, formats: &Formats, result: &ReconResult) -> Result<(), XlsxError> {
    write_header(ws, formats, &["metric", "value"])?;
    let s = &result.summary;
    let lines = [
        ("rows_a", s.rows_a),
        ("rows_b", s.rows_b),
        ("exact", s.exact),
        ("discrepant", s.discrepant),
        ("only_a", s.only_a),
        ("only_b", s.only_b),
    ];
    for (i, (name, value)) in lines.iter().enumerate() {
        let row = i as u32 + 1;
        ws.write_string(row, 0, *name)?;
        ws.write_number(row, 1, *value as f64)?;
    }
    Ok(())
}

fn write_identity(ws: &mut Worksheet, formats: &Formats, row: u32, c: &Classification) -> Result<(), XlsxError> {
    ws.write_string(row, 0, &c.business_id)?;
    match excel_datetime(c.occurred_at) {
        Ok(dt) => ws.write_datetime_with_format(row, 1, &dt, &formats.date)?,
        // Outside Excel's 1900-9999 calendar
        Err(_) => ws.write_string(row, 1, c.occurred_at.format(ISO_FORMAT).to_string())?,
    };
    ws.write_string(row, 2, &c.source_account)?;
    ws.write_string(row, 3, &c.destination_account)?;
    Ok(())
}

/// Amounts are written as numbers shown with at least two decimals and as
/// many as the value carries; a value outside f64 range falls back to its
/// exact text.
fn write_amount(
    ws: &mut Worksheet,
    formats: &Formats,
    row: u32,
    col: u16,
    amount: Option<Decimal>,
) -> Result<(), XlsxError> {
    if let Some(amount) = amount {
        match amount.to_f64() {
            Some(n) if amount.scale() <= 2 => ws.write_number_with_format(row, col, n, &formats.amount)?,
            Some(n) => {
                let wide = Format::new().set_num_format(amount_format(amount.scale()));
                ws.write_number_with_format(row, col, n, &wide)?
            }
            None => ws.write_string(row, col, amount.to_string())?,
        };
    }
    Ok(())
}

fn amount_format(scale: u32) -> String {
    format!("0.{}", "0".repeat(scale.max(2) as usize))
}

fn write_status(ws: &mut Worksheet, row: u32, col: u16, status: Option<Status>) -> Result<(), XlsxError> {
    if let Some(status) = status {
        ws.write_string(row, col, status.as_str())?;
    }
    Ok(())
}

fn excel_datetime(dt: NaiveDateTime) -> Result<ExcelDateTime, XlsxError> {
    let seconds = dt.second() as f64 + f64::from(dt.nanosecond()) / 1e9;
    let year = u16::try_from(dt.year()).unwrap_or(0);
    ExcelDateTime::from_ymd(year, dt.month() as u8, dt.day() as u8)?.and_hms(
        dt.hour() as u16,
        dt.minute() as u8,
        seconds,
    )
}
