use keyscout_core::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time cache statistics for observability endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries_by_type: HashMap<DataType, usize>,
    pub avg_latency_us: u64,
    pub insertions: u64,
    pub invalidations: u64,
    pub expired_removed: u64,
}

/// Lock-free counters shared across all cache operations.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    invalidations: AtomicU64,
    expired_removed: AtomicU64,
    lookup_count: AtomicU64,
    lookup_time_us: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lookup(&self, hit: bool, elapsed: Duration) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
        self.lookup_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries_by_type: HashMap<DataType, usize>) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        let lookups = self.lookup_count.load(Ordering::Relaxed);
        let avg_latency_us = if lookups == 0 {
            0
        } else {
            self.lookup_time_us.load(Ordering::Relaxed) / lookups
        };

        CacheStatsSnapshot {
            hits,
            misses,
            hit_rate,
            entries_by_type,
            avg_latency_us,
            insertions: self.insertions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
        }
    }
}
