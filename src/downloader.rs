use crate::records::SheetData;
#[cfg(feature = "web")]
use std::error::Error;

/// Convert worksheet data to CSV format
///
/// The header row comes first, then one line per record in header order.
/// Cells containing commas, quotes or line breaks are quoted, with inner
/// quotes doubled.
///
/// # Examples
/// ```
/// use ims_forms::downloader::to_csv;
/// use ims_forms::records::SheetData;
///
/// let data = SheetData::from_values(&[
///     vec!["Date".to_string(), "Remarks".to_string()],
///     vec!["2025-08-05".to_string(), "ok, checked".to_string()],
/// ]);
/// assert_eq!(to_csv(&data), "Date,Remarks\n2025-08-05,\"ok, checked\"\n");
/// ```
pub fn to_csv(data: &SheetData) -> String {
    let mut csv_content = String::new();
    push_line(&mut csv_content, data.headers.iter().map(String::as_str));
    for record in &data.records {
        push_line(&mut csv_content, data.row_cells(record).into_iter());
    }
    csv_content
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, value) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert worksheet data to XLSX format
///
/// Writes a single worksheet named after `title` with the header row in bold.
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(data: &SheetData, title: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    // Worksheet names are limited to 31 characters and a few reserved symbols.
    let name: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if !name.is_empty() {
        worksheet.set_name(name)?;
    }

    let bold = Format::new().set_bold();
    for (c, header) in data.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header, &bold)?;
    }
    for (r, record) in data.records.iter().enumerate() {
        for (c, value) in data.row_cells(record).into_iter().enumerate() {
            worksheet.write_string((r + 1) as u32, c as u16, value)?;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}
