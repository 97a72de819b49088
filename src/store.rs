//! Remote tabular store interface and two local implementations.
//!
//! Anything that can list, read and write worksheets of a spreadsheet can sit
//! behind [`TabularStore`]; the accessor only ever talks to this trait. The
//! client is expected to be authorized already, so credentials never pass
//! through here.

use crate::a1::CellRange;
use crate::error::{Delivery, RemoteError};
use crate::loader;
use crate::saving;
use crate::workbook::Workbook;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Operations the accessor needs from a spreadsheet service.
pub trait TabularStore {
    fn list_worksheets(&self, store_id: &str) -> Result<Vec<String>, RemoteError>;

    /// Every row of the worksheet up to the last one written, blank rows
    /// included; the first row is the header row.
    fn get_all_values(&self, store_id: &str, worksheet: &str)
    -> Result<Vec<Vec<String>>, RemoteError>;

    fn append_row(&self, store_id: &str, worksheet: &str, row: &[String])
    -> Result<(), RemoteError>;

    fn update_range(
        &self,
        store_id: &str,
        worksheet: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), RemoteError>;

    fn add_worksheet(&self, store_id: &str, title: &str, headers: &[String])
    -> Result<(), RemoteError>;

    fn delete_worksheet(&self, store_id: &str, title: &str) -> Result<(), RemoteError>;
}

fn store_not_found(store_id: &str) -> RemoteError {
    RemoteError::not_found(format!("Requested entity was not found: spreadsheet {}", store_id))
}

/// Workbooks held in memory.
///
/// Counts every call and can be primed with errors that the next calls
/// return instead of touching the data, which is how quota bursts are
/// simulated.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: Mutex<HashMap<String, Workbook>>,
    failures: Mutex<VecDeque<RemoteError>>,
    calls: AtomicUsize,
    read_latency: Mutex<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty workbook for `store_id`, replacing any existing one.
    pub fn create_store(&self, store_id: &str) {
        let mut books = self.books.lock().unwrap_or_else(PoisonError::into_inner);
        books.insert(store_id.to_string(), Workbook::new());
    }

    /// Put raw values into a worksheet, creating store and sheet as needed.
    pub fn seed(&self, store_id: &str, worksheet: &str, values: Vec<Vec<String>>) {
        let mut books = self.books.lock().unwrap_or_else(PoisonError::into_inner);
        let book = books.entry(store_id.to_string()).or_default();
        match book.sheet_mut(worksheet) {
            Ok(sheet) => sheet.rows = values,
            Err(_) => book.sheets.push(crate::workbook::Worksheet {
                title: worksheet.to_string(),
                rows: values,
            }),
        }
    }

    /// Queue an error for the next call.
    pub fn fail_next(&self, error: RemoteError) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.push_back(error);
    }

    /// Delay every `get_all_values` reply by `latency`, after the values
    /// were taken, the way a slow network round trip would.
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Calls received so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current raw values of a worksheet, bypassing counting and failures.
    pub fn snapshot(&self, store_id: &str, worksheet: &str) -> Option<Vec<Vec<String>>> {
        let books = self.books.lock().unwrap_or_else(PoisonError::into_inner);
        books
            .get(store_id)
            .and_then(|b| b.sheet(worksheet).ok())
            .map(|s| s.rows.clone())
    }

    fn with_book<T>(
        &self,
        store_id: &str,
        f: impl FnOnce(&mut Workbook) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(error);
        }
        let mut books = self.books.lock().unwrap_or_else(PoisonError::into_inner);
        let book = books
            .get_mut(store_id)
            .ok_or_else(|| store_not_found(store_id))?;
        f(book)
    }
}

impl TabularStore for MemoryStore {
    fn list_worksheets(&self, store_id: &str) -> Result<Vec<String>, RemoteError> {
        self.with_book(store_id, |book| Ok(book.titles()))
    }

    fn get_all_values(
        &self,
        store_id: &str,
        worksheet: &str,
    ) -> Result<Vec<Vec<String>>, RemoteError> {
        let values = self.with_book(store_id, |book| Ok(book.sheet(worksheet)?.rows.clone()));
        let latency = *self.read_latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        values
    }

    fn append_row(
        &self,
        store_id: &str,
        worksheet: &str,
        row: &[String],
    ) -> Result<(), RemoteError> {
        self.with_book(store_id, |book| {
            book.sheet_mut(worksheet)?.append_row(row);
            Ok(())
        })
    }

    fn update_range(
        &self,
        store_id: &str,
        worksheet: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        self.with_book(store_id, |book| {
            book.sheet_mut(worksheet)?.update_range(range, values)
        })
    }

    fn add_worksheet(
        &self,
        store_id: &str,
        title: &str,
        headers: &[String],
    ) -> Result<(), RemoteError> {
        self.with_book(store_id, |book| book.add_sheet(title, headers))
    }

    fn delete_worksheet(&self, store_id: &str, title: &str) -> Result<(), RemoteError> {
        self.with_book(store_id, |book| book.delete_sheet(title))
    }
}

/// One gzip-compressed workbook file per store id under a data directory.
///
/// Every call loads the file and every write saves it back, so the files can
/// be inspected or replaced between calls.
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            data_dir: data_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Store ids may contain characters that are awkward in file names.
    pub fn path_for(&self, store_id: &str) -> PathBuf {
        let file_name: String = store_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.data_dir.join(format!("{}.bin.gz", file_name))
    }

    /// Create an empty workbook file if none exists yet.
    pub fn create_store(&self, store_id: &str) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path_for(store_id);
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.data_dir).map_err(|e| io_error(&self.data_dir, e))?;
        saving::save_workbook(&Workbook::new(), &path).map_err(|e| io_error(&path, e))
    }

    /// Replace a worksheet's contents with the rows of a CSV file, creating
    /// the worksheet when needed. Returns the number of rows imported.
    pub fn import_csv(
        &self,
        store_id: &str,
        worksheet: &str,
        csv_path: impl AsRef<Path>,
    ) -> Result<usize, RemoteError> {
        let rows = loader::from_csv(csv_path.as_ref())
            .map_err(|e| RemoteError::new(Some(400), e.to_string()))?;
        let count = rows.len();
        self.modify(store_id, |book| {
            if book.sheet(worksheet).is_err() {
                book.add_sheet(worksheet, &[])?;
            }
            book.sheet_mut(worksheet)?.rows = rows;
            Ok(())
        })?;
        log::info!("imported {} rows into '{}'", count, worksheet);
        Ok(count)
    }

    fn read<T>(
        &self,
        store_id: &str,
        f: impl FnOnce(&Workbook) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let book = self.load(store_id)?;
        f(&book)
    }

    fn modify(
        &self,
        store_id: &str,
        f: impl FnOnce(&mut Workbook) -> Result<(), RemoteError>,
    ) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut book = self.load(store_id)?;
        f(&mut book)?;
        let path = self.path_for(store_id);
        saving::save_workbook(&book, &path)
            .map_err(|e| io_error(&path, e).with_delivery(Delivery::Unknown))
    }

    fn load(&self, store_id: &str) -> Result<Workbook, RemoteError> {
        let path = self.path_for(store_id);
        if !path.exists() {
            return Err(store_not_found(store_id));
        }
        saving::load_workbook(&path).map_err(|e| io_error(&path, e))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> RemoteError {
    RemoteError::new(None, format!("{}: {}", path.display(), e))
}

impl TabularStore for FileStore {
    fn list_worksheets(&self, store_id: &str) -> Result<Vec<String>, RemoteError> {
        self.read(store_id, |book| Ok(book.titles()))
    }

    fn get_all_values(
        &self,
        store_id: &str,
        worksheet: &str,
    ) -> Result<Vec<Vec<String>>, RemoteError> {
        self.read(store_id, |book| Ok(book.sheet(worksheet)?.rows.clone()))
    }

    fn append_row(
        &self,
        store_id: &str,
        worksheet: &str,
        row: &[String],
    ) -> Result<(), RemoteError> {
        self.modify(store_id, |book| {
            book.sheet_mut(worksheet)?.append_row(row);
            Ok(())
        })
    }

    fn update_range(
        &self,
        store_id: &str,
        worksheet: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        self.modify(store_id, |book| {
            book.sheet_mut(worksheet)?.update_range(range, values)
        })
    }

    fn add_worksheet(
        &self,
        store_id: &str,
        title: &str,
        headers: &[String],
    ) -> Result<(), RemoteError> {
        self.modify(store_id, |book| book.add_sheet(title, headers))
    }

    fn delete_worksheet(&self, store_id: &str, title: &str) -> Result<(), RemoteError> {
        self.modify(store_id, |book| book.delete_sheet(title))
    }
}

impl<S: TabularStore + ?Sized> TabularStore for std::sync::Arc<S> {
    fn list_worksheets(&self, store_id: &str) -> Result<Vec<String>, RemoteError> {
        (**self).list_worksheets(store_id)
    }

    fn get_all_values(
        &self,
        store_id: &str,
        worksheet: &str,
    ) -> Result<Vec<Vec<String>>, RemoteError> {
        (**self).get_all_values(store_id, worksheet)
    }

    fn append_row(
        &self,
        store_id: &str,
        worksheet: &str,
        row: &[String],
    ) -> Result<(), RemoteError> {
        (**self).append_row(store_id, worksheet, row)
    }

    fn update_range(
        &self,
        store_id: &str,
        worksheet: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        (**self).update_range(store_id, worksheet, range, values)
    }

    fn add_worksheet(
        &self,
        store_id: &str,
        title: &str,
        headers: &[String],
    ) -> Result<(), RemoteError> {
        (**self).add_worksheet(store_id, title, headers)
    }

    fn delete_worksheet(&self, store_id: &str, title: &str) -> Result<(), RemoteError> {
        (**self).delete_worksheet(store_id, title)
    }
}
