use crate::a1::CellRange;
use crate::error::RemoteError;
use serde::{Deserialize, Serialize};

/// One named tab: raw cell values, first row is the header row.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Worksheet {
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

/// Ordered collection of worksheets backing one store id.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

fn worksheet_not_found(title: &str) -> RemoteError {
    RemoteError::not_found(format!("worksheet not found: {}", title))
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.title.clone()).collect()
    }

    pub fn sheet(&self, title: &str) -> Result<&Worksheet, RemoteError> {
        self.sheets
            .iter()
            .find(|s| s.title == title)
            .ok_or_else(|| worksheet_not_found(title))
    }

    pub fn sheet_mut(&mut self, title: &str) -> Result<&mut Worksheet, RemoteError> {
        self.sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| worksheet_not_found(title))
    }

    /// Add a worksheet whose first row is `headers` (no row when empty).
    pub fn add_sheet(&mut self, title: &str, headers: &[String]) -> Result<(), RemoteError> {
        if self.sheets.iter().any(|s| s.title == title) {
            return Err(RemoteError::new(
                Some(400),
                format!("A sheet with the name \"{}\" already exists", title),
            ));
        }
        let rows = if headers.is_empty() {
            Vec::new()
        } else {
            vec![headers.to_vec()]
        };
        self.sheets.push(Worksheet {
            title: title.to_string(),
            rows,
        });
        Ok(())
    }

    pub fn delete_sheet(&mut self, title: &str) -> Result<(), RemoteError> {
        let before = self.sheets.len();
        self.sheets.retain(|s| s.title != title);
        if self.sheets.len() == before {
            return Err(worksheet_not_found(title));
        }
        Ok(())
    }
}

impl Worksheet {
    /// Trailing empty cells are dropped, as the spreadsheet service does.
    pub fn append_row(&mut self, row: &[String]) {
        let mut row = row.to_vec();
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
        self.rows.push(row);
    }

    /// Write `values` into `range`, growing the sheet to fit.
    pub fn update_range(
        &mut self,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        if values.len() > range.height() as usize
            || values.iter().any(|r| r.len() > range.width() as usize)
        {
            return Err(RemoteError::new(
                Some(400),
                format!("Requested writing within range [{}], but tried writing beyond it", range),
            ));
        }

        for (dr, row_values) in values.iter().enumerate() {
            let row_index = (range.start_row - 1) as usize + dr;
            if self.rows.len() <= row_index {
                self.rows.resize(row_index + 1, Vec::new());
            }
            let row = &mut self.rows[row_index];
            for (dc, value) in row_values.iter().enumerate() {
                let col_index = (range.start_col - 1) as usize + dc;
                if row.len() <= col_index {
                    row.resize(col_index + 1, String::new());
                }
                row[col_index] = value.clone();
            }
        }
        Ok(())
    }
}
