use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert a 1-based column number to its letter name (1 = A, 27 = AA).
pub fn col_to_letter(col: u32) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

/// Convert column letters back to a 1-based column number.
///
/// Returns `None` for an empty string or anything that is not A-Z.
pub fn letter_to_col(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)
    })
}

/// Name of a single cell, e.g. `cell_name(2, 3) == "C2"`.
pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letter(col), row)
}

/// Parse a cell name such as `B12` into `(row, col)`.
pub fn parse_cell_name(cell_name: &str) -> Option<(u32, u32)> {
    let mut letters = String::new();
    let mut digits = String::new();
    let mut found_digit = false;

    for c in cell_name.chars() {
        if c.is_ascii_alphabetic() {
            if found_digit {
                return None;
            }
            letters.push(c);
        } else if c.is_ascii_digit() {
            found_digit = true;
            digits.push(c);
        } else {
            return None;
        }
    }

    let col = letter_to_col(&letters)?;
    let row = digits.parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

/// Rectangular block of cells, inclusive on both corners, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Cells `A{row}` through the `width`-th column of the same row.
    pub fn row(row: u32, width: u32) -> Self {
        CellRange {
            start_row: row,
            start_col: 1,
            end_row: row,
            end_col: width.max(1),
        }
    }

    /// Parse `A2:C2`; a single cell name gives a one-cell range.
    pub fn parse(range: &str) -> Option<Self> {
        let (start, end) = match range.split_once(':') {
            Some((start, end)) => (start, end),
            None => (range, range),
        };
        let (start_row, start_col) = parse_cell_name(start.trim())?;
        let (end_row, end_col) = parse_cell_name(end.trim())?;
        if end_row < start_row || end_col < start_col {
            return None;
        }
        Some(CellRange {
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            cell_name(self.start_row, self.start_col),
            cell_name(self.end_row, self.end_col)
        )
    }
}
