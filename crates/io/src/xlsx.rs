// Spreadsheet decoding (xlsx, xlsm, xls, xlsb, ods) via calamine

use std::io::Cursor;

use calamine::{Data, Ods, Reader, Sheets, Xls, Xlsb, Xlsx};
use tally_recon::CellValue;

use crate::table::{TableError, TableFormat};

/// Rows of the first worksheet as typed cells.
pub(crate) fn read_rows(bytes: &[u8], format: TableFormat) -> Result<Vec<Vec<CellValue>>, TableError> {
    let parse_err = |message: String| TableError::Parse {
        format: format.name(),
        message,
    };

    let cursor = Cursor::new(bytes);
    let mut workbook: Sheets<_> = match format {
        TableFormat::Xlsx => Sheets::Xlsx(Xlsx::new(cursor).map_err(|e| parse_err(e.to_string()))?),
        TableFormat::Xls => Sheets::Xls(Xls::new(cursor).map_err(|e| parse_err(e.to_string()))?),
        TableFormat::Xlsb => Sheets::Xlsb(Xlsb::new(cursor).map_err(|e| parse_err(e.to_string()))?),
        TableFormat::Ods => Sheets::Ods(Ods::new(cursor).map_err(|e| parse_err(e.to_string()))?),
        TableFormat::Csv => return Err(parse_err("not a spreadsheet".to_string())),
    };

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| parse_err(e.to_string()))?,
        None => return Err(TableError::Empty),
    };

    Ok(range.rows().map(|row| row.iter().map(convert).collect()).collect())
}

fn convert(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        // Formulas see booleans as TRUE/FALSE text
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(_) => CellValue::Text("#ERR".to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::Date(naive),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
