use std::error::Error;
use std::fs;
use std::path::Path;

/// Load worksheet values from a CSV file
///
/// The first row is taken as the header row, exactly as exported from the
/// spreadsheet service. Quoted fields may contain commas, doubled quotes and
/// line breaks.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Vec<Vec<String>>, Box<dyn Error>>` - Rows of cell values or an error
///
/// # Examples
/// ```no_run
/// use ims_forms::loader::from_csv;
///
/// match from_csv("LW4 01A.csv") {
///     Ok(rows) => println!("Loaded {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
    let text = fs::read_to_string(filepath)?;
    let rows = parse_csv(text.trim_start_matches('\u{FEFF}'));

    if rows.is_empty() {
        return Err("CSV file is empty".into());
    }

    Ok(rows)
}

/// Parse CSV text into rows of strings
///
/// Blank lines are skipped. A trailing line break does not produce an extra row.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // Double quote inside quoted field - add a single quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current_field.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                row.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut current_field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => current_field.push(c),
        }
    }

    if !current_field.is_empty() || !row.is_empty() {
        row.push(current_field);
        rows.push(row);
    }

    rows
}
