use crate::key::key_data_type;
use crate::stats::{CacheStatsSnapshot, StatsCollector};
use crate::tiers::{InMemoryDurableStore, InMemoryFastStore};
use chrono::Utc;
use dashmap::DashMap;
use keyscout_core::{
    CacheEntry, CachePayload, DataType, DurableStore, FastStore, KeyscoutError, Result, TtlConfig,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type FlightResult = std::result::Result<CachePayload, Arc<KeyscoutError>>;

/// Two-tier cache with per-data-type TTLs, dependency-aware cascade
/// invalidation and single-flight generation dedup.
///
/// Lookups consult the fast tier first and promote durable hits into it.
/// Entries expire lazily: a lookup past `expires_at` is a miss even if no
/// sweep has run yet. All per-key mutations go through the sharded maps
/// of the underlying tiers; there is no process-wide lock.
pub struct CacheManager {
    fast: Arc<dyn FastStore>,
    durable: Arc<dyn DurableStore>,
    ttl: TtlConfig,
    /// Reverse dependency edges: parent key -> keys depending on it.
    dependents: DashMap<String, HashSet<String>>,
    /// One cell per in-flight generation, removed when the flight lands.
    flights: DashMap<String, Arc<OnceCell<FlightResult>>>,
    stats: StatsCollector,
}

impl CacheManager {
    pub fn new(fast: Arc<dyn FastStore>, durable: Arc<dyn DurableStore>, ttl: TtlConfig) -> Self {
        Self {
            fast,
            durable,
            ttl,
            dependents: DashMap::new(),
            flights: DashMap::new(),
            stats: StatsCollector::new(),
        }
    }

    /// Both tiers in memory; the default wiring for tests and
    /// single-process deployments.
    pub fn in_memory(ttl: TtlConfig) -> Self {
        Self::new(
            Arc::new(InMemoryFastStore::new()),
            Arc::new(InMemoryDurableStore::new()),
            ttl,
        )
    }

    pub async fn get(&self, key: &str) -> Result<Option<CachePayload>> {
        self.lookup(key, true).await
    }

    async fn lookup(&self, key: &str, record_stats: bool) -> Result<Option<CachePayload>> {
        let started = Instant::now();
        let found = self.lookup_tiers(key).await?;
        if record_stats {
            self.stats.record_lookup(found.is_some(), started.elapsed());
        }
        Ok(found)
    }

    async fn lookup_tiers(&self, key: &str) -> Result<Option<CachePayload>> {
        let now = Utc::now();

        if let Some(entry) = self.fast.get(key).await? {
            if entry.is_expired_at(now) {
                debug!("lazy-expiring {}", key);
                self.discard(key, &entry).await;
                return Ok(None);
            }
            self.fast.touch(key).await?;
            return Ok(Some(entry.payload));
        }

        match self.durable.get(key).await {
            Ok(Some(entry)) => {
                if entry.is_expired_at(now) {
                    debug!("lazy-expiring {}", key);
                    self.discard(key, &entry).await;
                    return Ok(None);
                }
                let mut promoted = entry.clone();
                promoted.touch();
                self.durable.touch(key).await?;
                self.fast.put(promoted).await?;
                Ok(Some(entry.payload))
            }
            Ok(None) => Ok(None),
            Err(KeyscoutError::CacheCorruption(reason)) => {
                warn!("self-healing corrupt entry {}: {}", key, reason);
                let _ = self.durable.remove(key).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write `payload` to both tiers. TTL comes from the per-data-type
    /// configuration table; `depends_on` keys must belong to an earlier
    /// pipeline stage, which keeps the dependency graph acyclic without
    /// any cycle detection here.
    pub async fn set(
        &self,
        key: &str,
        payload: CachePayload,
        depends_on: Vec<String>,
    ) -> Result<()> {
        let data_type = payload.data_type();
        for parent in &depends_on {
            match key_data_type(parent) {
                Some(stage) if stage < data_type => {}
                Some(stage) => {
                    return Err(KeyscoutError::Validation(format!(
                        "dependency {} ({}) does not precede {} entry {}",
                        parent, stage, data_type, key
                    )))
                }
                None => {
                    return Err(KeyscoutError::Validation(format!(
                        "dependency {} carries no data-type prefix",
                        parent
                    )))
                }
            }
        }

        let deps: HashSet<String> = depends_on.into_iter().collect();
        let entry = CacheEntry::new(key, payload, self.ttl.ttl(data_type), deps.clone());
        self.durable.put(entry.clone()).await?;
        self.fast.put(entry).await?;
        for parent in deps {
            self.dependents
                .entry(parent)
                .or_default()
                .insert(key.to_string());
        }
        self.stats.record_insertion();
        debug!("cached {} ({})", key, data_type);
        Ok(())
    }

    /// Remove `key` and, transitively, every entry depending on it.
    /// Returns the keys actually removed; invalidating an absent key is
    /// a no-op returning an empty list.
    pub async fn invalidate(&self, key: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        queue.push_back(key.to_string());
        seen.insert(key.to_string());

        while let Some(current) = queue.pop_front() {
            let fast_entry = self.fast.remove(&current).await?;
            let durable_entry = self.durable.remove(&current).await?;
            let dependents = self
                .dependents
                .remove(&current)
                .map(|(_, d)| d)
                .unwrap_or_default();

            if let Some(entry) = durable_entry.or(fast_entry) {
                self.unlink(&current, &entry.depends_on);
                removed.push(current);
            }

            for dependent in dependents {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }

        if !removed.is_empty() {
            self.stats.record_invalidations(removed.len() as u64);
            info!("invalidated {} entries cascading from {}", removed.len(), key);
        }
        Ok(removed)
    }

    /// Sweep both tiers for entries past their expiry. Complements the
    /// lazy expiration performed by `get`.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed: HashSet<String> = HashSet::new();

        for meta in self.fast.meta().await? {
            if meta.expires_at <= now {
                if let Some(entry) = self.fast.remove(&meta.key).await? {
                    self.unlink(&meta.key, &entry.depends_on);
                }
                removed.insert(meta.key);
            }
        }
        for meta in self.durable.meta().await? {
            if meta.expires_at <= now {
                if let Some(entry) = self.durable.remove(&meta.key).await? {
                    self.unlink(&meta.key, &entry.depends_on);
                }
                removed.insert(meta.key);
            }
        }

        let count = removed.len();
        if count > 0 {
            self.stats.record_expired(count as u64);
            debug!("sweep removed {} expired entries", count);
        }
        Ok(count)
    }

    /// Get with single-flight generation on miss: when N callers miss on
    /// the same key concurrently, exactly one runs `producer`; the rest
    /// await the same cell and observe the identical success or failure.
    /// A shared failure is handed to every waiter as-is, with no retry on
    /// their behalf; the next request after the flight lands starts a
    /// fresh one.
    pub async fn get_or_generate<F, Fut>(
        &self,
        key: &str,
        depends_on: Vec<String>,
        producer: F,
    ) -> Result<CachePayload>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachePayload>>,
    {
        if let Some(payload) = self.get(key).await? {
            return Ok(payload);
        }

        let flight = self
            .flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = flight
            .get_or_init(|| async {
                // an earlier flight may have landed between our miss and
                // claiming the cell
                match self.lookup(key, false).await {
                    Ok(Some(payload)) => return Ok(payload),
                    Ok(None) => {}
                    Err(e) => return Err(Arc::new(e)),
                }
                match producer().await {
                    Ok(payload) => {
                        if let Err(e) = self.set(key, payload.clone(), depends_on).await {
                            warn!("generated {} but could not cache it: {}", key, e);
                        }
                        Ok(payload)
                    }
                    Err(e) => Err(Arc::new(e)),
                }
            })
            .await
            .clone();

        self.flights
            .remove_if(key, |_, cell| Arc::ptr_eq(cell, &flight));

        result.map_err(|e| share_failure(&e))
    }

    pub async fn stats(&self) -> Result<CacheStatsSnapshot> {
        let now = Utc::now();
        let mut entries_by_type: HashMap<DataType, usize> = HashMap::new();
        for meta in self.durable.meta().await? {
            if meta.expires_at > now {
                *entries_by_type.entry(meta.data_type).or_default() += 1;
            }
        }
        Ok(self.stats.snapshot(entries_by_type))
    }

    /// Rebuild the reverse dependency index from the durable tier, for
    /// use after a restart (the fast tier and the index are both
    /// process-scoped). Returns the number of edges restored.
    pub async fn rebuild_dependents(&self) -> Result<usize> {
        let mut edges = 0;
        for meta in self.durable.meta().await? {
            if let Some(entry) = self.durable.get(&meta.key).await? {
                for parent in &entry.depends_on {
                    self.dependents
                        .entry(parent.clone())
                        .or_default()
                        .insert(entry.key.clone());
                    edges += 1;
                }
            }
        }
        if edges > 0 {
            info!("restored {} dependency edges from durable tier", edges);
        }
        Ok(edges)
    }

    /// Periodic background sweep.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                if let Err(e) = manager.cleanup_expired().await {
                    warn!("background sweep failed: {}", e);
                }
            }
        })
    }

    async fn discard(&self, key: &str, entry: &CacheEntry) {
        let _ = self.fast.remove(key).await;
        let _ = self.durable.remove(key).await;
        self.unlink(key, &entry.depends_on);
    }

    fn unlink(&self, key: &str, parents: &HashSet<String>) {
        for parent in parents {
            if let Some(mut set) = self.dependents.get_mut(parent) {
                set.remove(key);
                let empty = set.is_empty();
                drop(set);
                if empty {
                    self.dependents.remove_if(parent, |_, s| s.is_empty());
                }
            }
        }
    }
}

/// Reconstruct an owned error from the flight's shared failure so every
/// waiter receives the same variant and message.
fn share_failure(err: &KeyscoutError) -> KeyscoutError {
    match err {
        KeyscoutError::Validation(s) => KeyscoutError::Validation(s.clone()),
        KeyscoutError::RateLimited { reset_at } => KeyscoutError::RateLimited {
            reset_at: *reset_at,
        },
        KeyscoutError::UpstreamTimeout(s) => KeyscoutError::UpstreamTimeout(s.clone()),
        KeyscoutError::Upstream(s) => KeyscoutError::Upstream(s.clone()),
        KeyscoutError::CacheCorruption(s) => KeyscoutError::CacheCorruption(s.clone()),
        KeyscoutError::Storage(s) => KeyscoutError::Storage(s.clone()),
        other => KeyscoutError::Upstream(other.to_string()),
    }
}
