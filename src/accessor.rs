//! Every read and write against the store goes through [`Accessor`].
//!
//! A call first waits for room in the quota window, then runs under the
//! retry policy; successful reads are cached per worksheet until their TTL
//! runs out or a write to the same worksheet invalidates them. A cache hit
//! touches neither the store nor the quota window.

use crate::a1::CellRange;
use crate::cache::{SheetCache, SheetSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::error::{RemoteError, StoreError};
use crate::normalize::normalize;
use crate::quota::{QuotaTracker, QuotaUsage};
use crate::reconcile::{self, ReconciliationReport};
use crate::records::{FIRST_DATA_ROW, SheetData};
use crate::retry::{self, RetryPolicy};
use crate::schema::FormSchema;
use crate::store::TabularStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Tunables for caching, pacing and retrying.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessSettings {
    pub read_ttl: Duration,
    pub list_ttl: Duration,
    pub retry: RetryPolicy,
    pub max_calls_per_minute: usize,
    /// Minimum spacing between two calls
    pub min_interval: Duration,
}

impl Default for AccessSettings {
    fn default() -> Self {
        AccessSettings {
            read_ttl: Duration::from_secs(300),
            list_ttl: Duration::from_secs(600),
            retry: RetryPolicy::default(),
            max_calls_per_minute: 50,
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Where a row goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Append,
    /// Overwrite an existing data row, by sheet row number (2 = first)
    Row(u32),
}

struct AccessState {
    quota: QuotaTracker,
    cache: SheetCache,
}

pub struct Accessor<S, C = SystemClock> {
    store: S,
    clock: C,
    settings: AccessSettings,
    state: Mutex<AccessState>,
}

impl<S: TabularStore> Accessor<S, SystemClock> {
    pub fn new(store: S, settings: AccessSettings) -> Self {
        Self::with_clock(store, SystemClock, settings)
    }
}

impl<S: TabularStore, C: Clock> Accessor<S, C> {
    pub fn with_clock(store: S, clock: C, settings: AccessSettings) -> Self {
        let quota = QuotaTracker::new(settings.max_calls_per_minute, settings.min_interval);
        Accessor {
            store,
            clock,
            settings,
            state: Mutex::new(AccessState {
                quota,
                cache: SheetCache::new(),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &AccessSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, AccessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a quota slot is reserved for one remote call.
    fn acquire(&self) {
        loop {
            let now = self.clock.now();
            let wait = match self.state().quota.try_acquire(now) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            log::info!("quota window full, waiting {:?}", wait);
            self.clock.sleep(wait);
        }
    }

    /// Run `op` under the retry policy; every attempt takes its own quota slot.
    fn call<T>(&self, mut op: impl FnMut() -> Result<T, RemoteError>) -> Result<T, StoreError> {
        retry::retry(&self.settings.retry, &self.clock, || {
            self.acquire();
            op()
        })
    }

    fn snapshot(&self, worksheet: &str, store_id: &str) -> Result<Arc<SheetSnapshot>, StoreError> {
        let generation = {
            let state = self.state();
            if let Some(hit) = state.cache.sheet(store_id, worksheet, self.clock.now()) {
                log::debug!("cache hit for '{}'", worksheet);
                return Ok(hit);
            }
            state.cache.sheet_generation(store_id, worksheet)
        };

        log::debug!("fetching '{}' from store {}", worksheet, store_id);
        let values = self.call(|| self.store.get_all_values(store_id, worksheet))?;
        let now = self.clock.now();
        Ok(self.state().cache.put_sheet(
            store_id,
            worksheet,
            SheetSnapshot { values },
            generation,
            now,
            self.settings.read_ttl,
        ))
    }

    /// Header row and records of a worksheet.
    ///
    /// Empty when the worksheet has no data rows, even if it has headers.
    pub fn read(&self, worksheet: &str, store_id: &str) -> Result<SheetData, StoreError> {
        let snapshot = self.snapshot(worksheet, store_id)?;
        Ok(SheetData::from_values(&snapshot.values))
    }

    /// Current header row, also for worksheets without data rows.
    pub fn header_row(&self, worksheet: &str, store_id: &str) -> Result<Vec<String>, StoreError> {
        let snapshot = self.snapshot(worksheet, store_id)?;
        Ok(snapshot.headers().to_vec())
    }

    pub fn list_worksheets(&self, store_id: &str) -> Result<Vec<String>, StoreError> {
        let generation = {
            let state = self.state();
            if let Some(hit) = state.cache.worksheets(store_id, self.clock.now()) {
                return Ok(hit.as_ref().clone());
            }
            state.cache.list_generation(store_id)
        };

        let names = self.call(|| self.store.list_worksheets(store_id))?;
        let now = self.clock.now();
        let names = self.state().cache.put_worksheets(
            store_id,
            names,
            generation,
            now,
            self.settings.list_ttl,
        );
        Ok(names.as_ref().clone())
    }

    pub fn invalidate_store(&self, store_id: &str) {
        self.state().cache.invalidate_store(store_id);
    }

    pub fn invalidate_worksheet(&self, worksheet: &str, store_id: &str) {
        self.state().cache.invalidate_sheet(store_id, worksheet);
    }

    /// Forget every cached read and every recorded call.
    pub fn clear(&self) {
        let mut state = self.state();
        state.cache.clear();
        state.quota.reset();
    }

    pub fn quota_usage(&self) -> QuotaUsage {
        let now = self.clock.now();
        self.state().quota.usage(now)
    }

    /// Write one row, then drop the worksheet's cached read.
    ///
    /// On failure nothing is invalidated and the store's message is returned
    /// as is; [`StoreError::delivery`] tells whether the row may have landed.
    pub fn write(
        &self,
        worksheet: &str,
        store_id: &str,
        target: WriteTarget,
        row_values: &[String],
    ) -> Result<(), StoreError> {
        match target {
            WriteTarget::Append => {
                self.call(|| self.store.append_row(store_id, worksheet, row_values))?;
            }
            WriteTarget::Row(row) => {
                if row < FIRST_DATA_ROW {
                    return Err(StoreError::InvalidRow(row));
                }
                let range = CellRange::row(row, row_values.len() as u32);
                let values = vec![row_values.to_vec()];
                self.call(|| self.store.update_range(store_id, worksheet, &range, &values))?;
            }
        }
        log::info!("wrote {:?} to '{}'", target, worksheet);
        self.invalidate_worksheet(worksheet, store_id);
        Ok(())
    }

    /// Lay `values` out along the live header row and write them.
    ///
    /// Returns the row as written.
    pub fn submit(
        &self,
        worksheet: &str,
        store_id: &str,
        target: WriteTarget,
        values: &HashMap<String, String>,
    ) -> Result<Vec<String>, StoreError> {
        let headers = self.header_row(worksheet, store_id)?;
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(StoreError::NoHeaderRow(worksheet.to_string()));
        }
        let row = reconcile::map_submission(values, &headers);
        self.write(worksheet, store_id, target, &row)?;
        Ok(row)
    }

    /// Create a worksheet whose first row is `headers`.
    pub fn create_worksheet(
        &self,
        worksheet: &str,
        store_id: &str,
        headers: &[String],
    ) -> Result<(), StoreError> {
        self.call(|| self.store.add_worksheet(store_id, worksheet, headers))?;
        log::info!("created worksheet '{}' with {} columns", worksheet, headers.len());
        self.invalidate_store(store_id);
        Ok(())
    }

    /// Rename one header cell in place. Returns `false` when no header
    /// matches `old`, exactly or under normalization.
    pub fn rename_header(
        &self,
        worksheet: &str,
        store_id: &str,
        old: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let headers = self.header_row(worksheet, store_id)?;
        let key = normalize(old);
        let position = headers
            .iter()
            .position(|h| h == old)
            .or_else(|| headers.iter().position(|h| !key.is_empty() && normalize(h) == key));
        let Some(index) = position else {
            return Ok(false);
        };

        let col = index as u32 + 1;
        let range = CellRange {
            start_row: 1,
            start_col: col,
            end_row: 1,
            end_col: col,
        };
        let values = vec![vec![new.to_string()]];
        self.call(|| self.store.update_range(store_id, worksheet, &range, &values))?;
        log::info!("renamed '{}' to '{}' in '{}' ({})", headers[index], new, worksheet, range);
        self.invalidate_worksheet(worksheet, store_id);
        Ok(true)
    }

    /// Compare a form schema with the worksheet's live header row.
    pub fn reconcile(
        &self,
        schema: &FormSchema,
        worksheet: &str,
        store_id: &str,
    ) -> Result<ReconciliationReport, StoreError> {
        let headers = self.header_row(worksheet, store_id)?;
        let report = reconcile::diff(schema, &headers);
        if !report.is_clean() {
            log::warn!(
                "'{}' drifted: {} missing, {} extra, order matches: {}",
                worksheet,
                report.missing.len(),
                report.extra.len(),
                report.order_matches
            );
        }
        Ok(report)
    }
}
