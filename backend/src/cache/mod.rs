//! Table Cache - time-windowed memoization of loaded tables
//!
//! Each entry is a whole canonical table behind an `Arc`, replaced as a unit
//! on reload and never mutated in place. Expiry is checked against an
//! injectable [`Clock`] so tests can move time by hand.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::CanonicalTable;

/// Default time window, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A cached table with its load time
#[derive(Debug, Clone)]
struct CachedTable {
    table: Arc<CanonicalTable>,
    loaded_at: DateTime<Utc>,
}

/// Per-year table cache with a fixed time window.
pub struct TableCache<C: Clock = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: Mutex<HashMap<String, CachedTable>>,
}

impl TableCache<SystemClock> {
    /// Cache on the wall clock with the default window.
    pub fn new() -> Self {
        Self::with_clock(Duration::seconds(DEFAULT_TTL_SECS), SystemClock)
    }

    /// Cache on the wall clock with a custom window.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl Default for TableCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TableCache<C> {
    /// Cache with a custom window and clock
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached table for `key` if still inside the window. Expired entries
    /// are dropped.
    pub fn get(&self, key: &str) -> Option<Arc<CanonicalTable>> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if now - entry.loaded_at < self.ttl => Some(Arc::clone(&entry.table)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a freshly loaded table, replacing any previous entry whole.
    pub fn insert(&self, key: impl Into<String>, table: Arc<CanonicalTable>) {
        let entry = CachedTable {
            table,
            loaded_at: self.clock.now(),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedTable>> {
        // entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;

    fn cache() -> (TableCache<ManualClock>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = TableCache::with_clock(Duration::seconds(DEFAULT_TTL_SECS), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_hit_inside_window() {
        let (cache, clock) = cache();
        cache.insert("2023", Arc::new(Table::default()));

        clock.advance(Duration::seconds(299));
        assert!(cache.get("2023").is_some());
    }

    #[test]
    fn test_miss_at_expiry() {
        let (cache, clock) = cache();
        cache.insert("2023", Arc::new(Table::default()));

        clock.advance(Duration::seconds(300));
        assert!(cache.get("2023").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keyed_by_year_only() {
        let (cache, _) = cache();
        cache.insert("2023", Arc::new(Table::default()));
        assert!(cache.get("2024").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_replace_restarts_window() {
        let (cache, clock) = cache();
        cache.insert("2023", Arc::new(Table::default()));
        clock.advance(Duration::seconds(200));

        let fresh = Arc::new(Table::new(vec!["program".into()]));
        cache.insert("2023", Arc::clone(&fresh));
        clock.advance(Duration::seconds(200));

        let got = cache.get("2023").unwrap();
        assert!(Arc::ptr_eq(&got, &fresh));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (cache, _) = cache();
        cache.insert("2022", Arc::new(Table::default()));
        cache.insert("2023", Arc::new(Table::default()));

        assert!(cache.invalidate("2022"));
        assert!(!cache.invalidate("2022"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
