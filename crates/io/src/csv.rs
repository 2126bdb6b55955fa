// CSV decoding

use tally_recon::CellValue;

use crate::table::TableError;

pub(crate) fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, TableError> {
    let content = decode_text(bytes);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| TableError::Parse {
            format: "csv",
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(CellValue::from).collect());
    }
    Ok(rows)
}

/// UTF-8 first; on failure fall back to Windows-1252 (common for
/// Excel-exported CSVs).
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Pick the delimiter (comma, semicolon, tab, pipe) that splits the header
/// into the most columns agreed on by the following lines. Blank lines are
/// ignored; ties go to the earlier candidate.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .collect();
    let Some(header) = sample.first() else {
        return b',';
    };

    let mut best = (b',', 0usize);
    for delim in [b',', b';', b'\t', b'|'] {
        let width = field_count(header, delim);
        if width < 2 {
            continue;
        }
        let agreeing = sample.iter().filter(|line| field_count(line, delim) == width).count();
        let score = agreeing * width;
        if score > best.1 {
            best = (delim, score);
        }
    }
    best.0
}

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_semicolon() {
        let content = "id;monto;estado\nT1;100,50;Exitosa\nT2;7;Fallida\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn sniffs_comma_with_quoted_thousands() {
        let content = "id,monto\nT1,\"1,234.56\"\nT2,\"2,000.00\"\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn sniffs_tab() {
        assert_eq!(sniff_delimiter("id\tmonto\nT1\t5\n"), b'\t');
    }

    #[test]
    fn empty_or_blank_input_defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        assert_eq!(sniff_delimiter("\n  \n"), b',');
        assert_eq!(sniff_delimiter("solo_una_columna\nT1\n"), b',');
    }

    #[test]
    fn leading_blank_lines_do_not_hide_the_header() {
        assert_eq!(sniff_delimiter("\n\nid|monto\nT1|5\n"), b'|');
    }

    #[test]
    fn empty_fields_are_empty_cells() {
        let rows = read_rows(b"id,nota\nT1,\n").unwrap();
        assert_eq!(rows[1], vec![CellValue::from("T1"), CellValue::Empty]);
    }

    #[test]
    fn bom_is_stripped() {
        let rows = read_rows("\u{feff}id,monto\nT1,5\n".as_bytes()).unwrap();
        assert_eq!(rows[0][0], CellValue::from("id"));
    }

    #[test]
    fn windows_1252_falls_back() {
        // "Año" with 0xF1 for ñ
        let bytes = b"id,A\xf1o\nT1,2023\n";
        let rows = read_rows(bytes).unwrap();
        assert_eq!(rows[0][1], CellValue::from("Año"));
    }
}
