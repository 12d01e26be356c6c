//! Time-bounded store of the latest reading per location.

use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};

use crate::model::{LocationKey, WeatherReading};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    reading: WeatherReading,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn reading(&self) -> &WeatherReading {
        &self.reading
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Latest reading per [`LocationKey`], fresh until `fetched_at + ttl`.
///
/// A replacement is only accepted when it is strictly newer than the stored
/// reading, so late completions of overlapping jobs cannot roll state back.
#[derive(Debug)]
pub struct ResultCache {
    ttl: chrono::Duration,
    entries: HashMap<LocationKey, CacheEntry>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self { ttl, entries: HashMap::new() }
    }

    /// Returns the cached reading if it is still fresh at `now`.
    /// Expired entries are evicted on the way out.
    pub fn lookup(&mut self, key: &LocationKey, now: DateTime<Utc>) -> Option<WeatherReading> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(now) {
            return Some(entry.reading.clone());
        }

        tracing::debug!(location = %key, "cache entry expired");
        self.entries.remove(key);
        None
    }

    /// Stores `reading` under `key`. Returns `false` (and keeps the old entry)
    /// when the stored reading is as new or newer.
    pub fn store(&mut self, key: LocationKey, reading: WeatherReading) -> bool {
        if let Some(existing) = self.entries.get(&key) {
            if existing.reading.timestamp() >= reading.timestamp() {
                tracing::debug!(
                    location = %key,
                    stored = %existing.reading.timestamp(),
                    incoming = %reading.timestamp(),
                    "discarding out-of-order reading"
                );
                return false;
            }
        }

        let expires_at = reading
            .timestamp()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries.insert(key, CacheEntry { reading, expires_at });
        true
    }

    pub fn invalidate(&mut self, key: &LocationKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn entry(&self, key: &LocationKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
