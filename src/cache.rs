use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Raw worksheet values as fetched, header row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSnapshot {
    pub values: Vec<Vec<String>>,
}

impl SheetSnapshot {
    pub fn headers(&self) -> &[String] {
        self.values.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

/// Invalidation counters seen when a fetch started.
///
/// A fetch whose generation no longer matches at insert time raced with an
/// invalidation and its result is not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    store: u64,
    sheet: u64,
}

/// Read results keyed by store id, and by (store id, worksheet) for sheets.
///
/// Entries are shared immutably and replaced wholesale on refetch. The
/// generation counters only ever grow; dropping entries never resets them.
#[derive(Debug, Default)]
pub struct SheetCache {
    sheets: HashMap<(String, String), CacheEntry<SheetSnapshot>>,
    worksheet_lists: HashMap<String, CacheEntry<Vec<String>>>,
    epoch: u64,
    store_generations: HashMap<String, u64>,
    sheet_generations: HashMap<(String, String), u64>,
}

fn sheet_key(store_id: &str, worksheet: &str) -> (String, String) {
    (store_id.to_string(), worksheet.to_string())
}

impl SheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, store_id: &str, worksheet: &str, now: Instant) -> Option<Arc<SheetSnapshot>> {
        self.sheets
            .get(&sheet_key(store_id, worksheet))
            .filter(|e| e.is_fresh(now))
            .map(|e| Arc::clone(&e.value))
    }

    /// Capture before fetching a worksheet; hand back to [`SheetCache::put_sheet`].
    pub fn sheet_generation(&self, store_id: &str, worksheet: &str) -> Generation {
        Generation {
            sheet: self
                .sheet_generations
                .get(&sheet_key(store_id, worksheet))
                .copied()
                .unwrap_or(0),
            ..self.list_generation(store_id)
        }
    }

    /// Capture before listing worksheets; hand back to [`SheetCache::put_worksheets`].
    pub fn list_generation(&self, store_id: &str) -> Generation {
        Generation {
            epoch: self.epoch,
            store: self.store_generations.get(store_id).copied().unwrap_or(0),
            sheet: 0,
        }
    }

    /// Cache `snapshot` unless the worksheet was invalidated since
    /// `generation` was taken. The snapshot is returned either way.
    pub fn put_sheet(
        &mut self,
        store_id: &str,
        worksheet: &str,
        snapshot: SheetSnapshot,
        generation: Generation,
        now: Instant,
        ttl: Duration,
    ) -> Arc<SheetSnapshot> {
        let value = Arc::new(snapshot);
        if generation != self.sheet_generation(store_id, worksheet) {
            log::debug!("'{}' was invalidated during the fetch, not caching", worksheet);
            return value;
        }
        self.sheets.insert(
            sheet_key(store_id, worksheet),
            CacheEntry {
                value: Arc::clone(&value),
                fetched_at: now,
                ttl,
            },
        );
        value
    }

    pub fn worksheets(&self, store_id: &str, now: Instant) -> Option<Arc<Vec<String>>> {
        self.worksheet_lists
            .get(store_id)
            .filter(|e| e.is_fresh(now))
            .map(|e| Arc::clone(&e.value))
    }

    pub fn put_worksheets(
        &mut self,
        store_id: &str,
        names: Vec<String>,
        generation: Generation,
        now: Instant,
        ttl: Duration,
    ) -> Arc<Vec<String>> {
        let value = Arc::new(names);
        if generation != self.list_generation(store_id) {
            return value;
        }
        self.worksheet_lists.insert(
            store_id.to_string(),
            CacheEntry {
                value: Arc::clone(&value),
                fetched_at: now,
                ttl,
            },
        );
        value
    }

    /// Drop everything cached for a store, worksheet list included.
    pub fn invalidate_store(&mut self, store_id: &str) {
        self.sheets.retain(|(store, _), _| store != store_id);
        self.worksheet_lists.remove(store_id);
        *self.store_generations.entry(store_id.to_string()).or_insert(0) += 1;
    }

    pub fn invalidate_sheet(&mut self, store_id: &str, worksheet: &str) {
        let key = sheet_key(store_id, worksheet);
        self.sheets.remove(&key);
        *self.sheet_generations.entry(key).or_insert(0) += 1;
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
        self.worksheet_lists.clear();
        self.epoch += 1;
    }

    /// Entries held, fresh or not.
    pub fn len(&self) -> usize {
        self.sheets.len() + self.worksheet_lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cells: &[&str]) -> SheetSnapshot {
        SheetSnapshot {
            values: vec![cells.iter().map(|s| s.to_string()).collect()],
        }
    }

    #[test]
    fn test_fetch_racing_an_invalidation_is_not_cached() {
        let mut cache = SheetCache::new();
        let now = Instant::now();
        let ttl = Duration::from_secs(300);

        let before = cache.sheet_generation("lw-files", "LW4 01A");
        cache.invalidate_sheet("lw-files", "LW4 01A");
        cache.put_sheet("lw-files", "LW4 01A", snapshot(&["Date"]), before, now, ttl);
        assert!(cache.sheet("lw-files", "LW4 01A", now).is_none());

        let current = cache.sheet_generation("lw-files", "LW4 01A");
        cache.put_sheet("lw-files", "LW4 01A", snapshot(&["Date"]), current, now, ttl);
        assert!(cache.sheet("lw-files", "LW4 01A", now).is_some());
    }

    #[test]
    fn test_store_invalidation_and_clear_bump_generations() {
        let mut cache = SheetCache::new();
        let now = Instant::now();
        let ttl = Duration::from_secs(300);

        let sheet = cache.sheet_generation("lw-files", "LW4 01A");
        let list = cache.list_generation("lw-files");
        cache.invalidate_store("lw-files");
        cache.put_sheet("lw-files", "LW4 01A", snapshot(&["Date"]), sheet, now, ttl);
        cache.put_worksheets("lw-files", vec!["LW4 01A".to_string()], list, now, ttl);
        assert!(cache.is_empty());

        let other = cache.sheet_generation("mpr-files", "MPR 07");
        cache.clear();
        cache.put_sheet("mpr-files", "MPR 07", snapshot(&["Lot"]), other, now, ttl);
        assert!(cache.is_empty());

        // Another store's invalidation leaves this one alone
        let sheet = cache.sheet_generation("lw-files", "LW4 01A");
        cache.invalidate_store("mpr-files");
        cache.put_sheet("lw-files", "LW4 01A", snapshot(&["Date"]), sheet, now, ttl);
        assert_eq!(cache.len(), 1);
    }
}
