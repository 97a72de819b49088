use serde::Serialize;
use std::collections::HashMap;

/// One data row, keyed by header name.
pub type Record = HashMap<String, String>;

/// Marker written for a signed signature column.
pub const SIGNED: &str = "✔️ Yes";
/// Marker written for an unsigned signature column.
pub const NOT_SIGNED: &str = "❌ No";

/// Sheet row number of the first data row (row 1 holds the headers).
pub const FIRST_DATA_ROW: u32 = 2;

/// Header row plus one record per data row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl SheetData {
    /// Build from raw cell values where the first row is the header row.
    ///
    /// A worksheet without data rows yields the empty value, header or not.
    pub fn from_values(values: &[Vec<String>]) -> Self {
        match values.split_first() {
            Some((headers, rows)) if !rows.is_empty() => SheetData {
                headers: headers.clone(),
                records: build_records(headers, rows),
            },
            _ => SheetData::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at a sheet row number (2 = first data row).
    pub fn record_at(&self, row: u32) -> Option<&Record> {
        let index = row.checked_sub(FIRST_DATA_ROW)? as usize;
        self.records.get(index)
    }

    /// Cells of a record in header order, for tabular output.
    pub fn row_cells<'a>(&'a self, record: &'a Record) -> Vec<&'a str> {
        self.headers
            .iter()
            .map(|h| record.get(h).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

/// Pad a short row with empty cells up to `width`. Longer rows are kept whole.
pub fn pad_row(row: &[String], width: usize) -> Vec<String> {
    let mut padded = row.to_vec();
    if padded.len() < width {
        padded.resize(width, String::new());
    }
    padded
}

/// Zip every row against the headers, padding short rows first.
///
/// Cells beyond the last header have no name and are not part of the record.
pub fn build_records(headers: &[String], rows: &[Vec<String>]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            let padded = pad_row(row, headers.len());
            headers.iter().cloned().zip(padded).collect()
        })
        .collect()
}

/// A record together with its sheet row number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberedRecord<'a> {
    pub row: u32,
    pub record: &'a Record,
}

/// Records with any cell containing `term`, case-insensitively.
///
/// A blank term matches every record.
pub fn search<'a>(records: &'a [Record], term: &str) -> Vec<NumberedRecord<'a>> {
    let needle = term.trim().to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            needle.is_empty()
                || record
                    .values()
                    .any(|value| value.to_lowercase().contains(&needle))
        })
        .map(|(i, record)| NumberedRecord {
            row: i as u32 + FIRST_DATA_ROW,
            record,
        })
        .collect()
}

/// Signed / not-signed counts for one signature column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignatureTally {
    pub signed: usize,
    pub not_signed: usize,
    pub total: usize,
}

pub fn tally_signatures(records: &[Record], column: &str) -> SignatureTally {
    let mut tally = SignatureTally::default();
    for value in records.iter().filter_map(|r| r.get(column)) {
        tally.total += 1;
        if value.contains('✔') || value.contains("Yes") {
            tally.signed += 1;
        } else if value.contains('❌') || value.contains("No") {
            tally.not_signed += 1;
        }
    }
    tally
}
