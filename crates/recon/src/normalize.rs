//! Cell-level coercion: free-text dates, currency-formatted amounts, and the
//! tagged cell type that table readers hand to the ingestion pipeline.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::FormatError;

/// Date-only patterns, in priority order. Day/month/year is tried before
/// month/day/year, so `01/02/2023` is the 1st of February.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2023-01-31
    "%d/%m/%Y", // 31/01/2023
    "%m/%d/%Y", // 01/31/2023 (US)
    "%d-%m-%Y", // 31-01-2023
    "%d.%m.%Y", // 31.01.2023
];

/// Timestamp patterns, tried after every date-only pattern has failed.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Years a parsed date may fall in. `%Y` alone would take `23` as year 23,
/// and spreadsheets cannot represent anything before 1900.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=9999;

/// ISO-8601 rendering used for dates in audit attributes and JSON output.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A raw table cell as decoded from the uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    /// True for missing cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// JSON form for the audit blob: dates become ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Date(dt) => serde_json::Value::String(dt.format(ISO_FORMAT).to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

/// Parse a free-text date against the fixed pattern list. Date-only
/// inputs resolve to midnight.
pub fn parse_date(input: &str) -> Result<NaiveDateTime, FormatError> {
    let trimmed = input.trim();

    let in_range = |dt: &NaiveDateTime| YEAR_RANGE.contains(&dt.year());

    let date_only = DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|date| date.and_time(chrono::NaiveTime::MIN));
    let timestamps = DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok());

    if let Some(dt) = date_only.chain(timestamps).find(in_range) {
        return Ok(dt);
    }

    Err(FormatError::Date(input.to_string()))
}

/// Parse a currency-formatted amount into an exact decimal.
///
/// Strips `$`, `€`, thousands separators and whitespace. A parenthesized
/// value is negative: `($1,200.00)` is `-1200.00`.
pub fn parse_amount(input: &str) -> Result<Decimal, FormatError> {
    let trimmed = input.trim();
    let (negative, inner) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || (negative && cleaned.starts_with(['-', '+'])) {
        return Err(FormatError::Amount(input.to_string()));
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| FormatError::Amount(input.to_string()))?;
    Ok(if negative { -value } else { value })
}

/// Coerce a cell to a date. Spreadsheets that type the cell as a date pass
/// straight through; text is parsed.
pub fn coerce_date(cell: &CellValue) -> Result<NaiveDateTime, FormatError> {
    match cell {
        CellValue::Date(dt) => Ok(*dt),
        CellValue::Text(s) if !s.trim().is_empty() => parse_date(s),
        CellValue::Number(n) => Err(FormatError::NotADate(format!("number {n}"))),
        _ => Err(FormatError::Empty),
    }
}

/// Coerce a cell to an exact decimal. Numeric cells go through their
/// shortest round-trip text, so `100.5_f64` becomes `100.5`, not the binary
/// expansion.
pub fn coerce_amount(cell: &CellValue) -> Result<Decimal, FormatError> {
    match cell {
        CellValue::Number(n) => {
            if !n.is_finite() {
                return Err(FormatError::Amount(n.to_string()));
            }
            Decimal::from_str(&n.to_string()).map_err(|_| FormatError::Amount(n.to_string()))
        }
        CellValue::Text(s) if !s.trim().is_empty() => parse_amount(s),
        CellValue::Date(dt) => Err(FormatError::Amount(dt.format(ISO_FORMAT).to_string())),
        _ => Err(FormatError::Empty),
    }
}

/// Coerce a cell to trimmed, non-empty text (ids, accounts, status).
pub fn coerce_text(cell: &CellValue) -> Result<String, FormatError> {
    let text = match cell {
        CellValue::Empty => return Err(FormatError::Empty),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Date(dt) => dt.format(ISO_FORMAT).to_string(),
    };
    if text.is_empty() {
        return Err(FormatError::Empty);
    }
    Ok(text)
}

/// Integral numbers render without a fraction so numeric account columns
/// keep their natural form (`123456.0` → `123456`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
