use crate::records::{decode_entry, encode_entry};
use async_trait::async_trait;
use dashmap::DashMap;
use keyscout_core::{CacheEntry, DurableStore, EntryMeta, FastStore, Result};
use tracing::warn;

/// Process-scoped fast tier backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryFastStore {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.remove(key).map(|(_, e)| e))
    }

    async fn touch(&self, key: &str) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.touch();
        }
        Ok(())
    }

    async fn meta(&self) -> Result<Vec<EntryMeta>> {
        Ok(self
            .entries
            .iter()
            .map(|e| EntryMeta {
                key: e.key.clone(),
                data_type: e.data_type,
                expires_at: e.expires_at,
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// In-memory stand-in for a remote durable tier. Stores encoded records
/// (not live structs) so the decode path is exercised exactly as with a
/// real backend, including corruption handling.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    records: DashMap<String, Vec<u8>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Test hook: plant raw bytes under a key, bypassing encoding.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.records.insert(key.into(), bytes);
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.records.get(key) {
            Some(bytes) => decode_entry(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let bytes = encode_entry(&entry)?;
        self.records.insert(entry.key.clone(), bytes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.records.remove(key) {
            Some((_, bytes)) => match decode_entry(&bytes) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    warn!("removed undecodable record {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn touch(&self, key: &str) -> Result<()> {
        if let Some(mut slot) = self.records.get_mut(key) {
            let mut entry = decode_entry(&slot)?;
            entry.touch();
            *slot = encode_entry(&entry)?;
        }
        Ok(())
    }

    async fn meta(&self) -> Result<Vec<EntryMeta>> {
        let mut out = Vec::with_capacity(self.records.len());
        for record in self.records.iter() {
            match decode_entry(record.value()) {
                Ok(entry) => out.push(EntryMeta {
                    key: entry.key,
                    data_type: entry.data_type,
                    expires_at: entry.expires_at,
                }),
                Err(e) => warn!("skipping undecodable record {}: {}", record.key(), e),
            }
        }
        Ok(out)
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}
