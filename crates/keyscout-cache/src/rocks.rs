use crate::key::key_data_type;
use crate::records::{decode_entry, encode_entry};
use async_trait::async_trait;
use keyscout_core::{CacheEntry, DataType, DurableStore, EntryMeta, KeyscoutError, Result};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};

/// Durable tier on rocksdb, one column family per data type.
#[derive(Clone)]
pub struct RocksDurableStore {
    db: Arc<DB>,
}

fn cf_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Keywords => "keywords",
        DataType::Serp => "serp",
        DataType::Brief => "brief",
        DataType::Suggestions => "suggestions",
    }
}

fn cf_for_key(key: &str) -> Result<&'static str> {
    key_data_type(key)
        .map(cf_name)
        .ok_or_else(|| KeyscoutError::Storage(format!("key {} carries no data-type prefix", key)))
}

impl RocksDurableStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let descriptors: Vec<ColumnFamilyDescriptor> = DataType::ALL
            .iter()
            .map(|dt| ColumnFamilyDescriptor::new(cf_name(*dt), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), descriptors)
            .map_err(|e| KeyscoutError::Storage(format!("failed to open database: {}", e)))?;

        info!("opened durable cache tier at {}", path.as_ref().display());
        Ok(Self { db: Arc::new(db) })
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<DB>) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || op(db))
            .await
            .map_err(|e| KeyscoutError::Storage(format!("blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl DurableStore for RocksDurableStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let cf = cf_for_key(key)?;
        let key = key.to_string();
        self.run_blocking(move |db| {
            let handle = db
                .cf_handle(cf)
                .ok_or_else(|| KeyscoutError::Storage(format!("missing column family {}", cf)))?;
            let bytes = db
                .get_cf(handle, key.as_bytes())
                .map_err(|e| KeyscoutError::Storage(format!("read failed: {}", e)))?;
            match bytes {
                Some(bytes) => decode_entry(&bytes).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let cf = cf_name(entry.data_type);
        let bytes = encode_entry(&entry)?;
        let key = entry.key;
        self.run_blocking(move |db| {
            let handle = db
                .cf_handle(cf)
                .ok_or_else(|| KeyscoutError::Storage(format!("missing column family {}", cf)))?;
            db.put_cf(handle, key.as_bytes(), &bytes)
                .map_err(|e| KeyscoutError::Storage(format!("write failed: {}", e)))
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<Option<CacheEntry>> {
        let cf = cf_for_key(key)?;
        let key = key.to_string();
        self.run_blocking(move |db| {
            let handle = db
                .cf_handle(cf)
                .ok_or_else(|| KeyscoutError::Storage(format!("missing column family {}", cf)))?;
            let bytes = db
                .get_cf(handle, key.as_bytes())
                .map_err(|e| KeyscoutError::Storage(format!("read failed: {}", e)))?;
            let Some(bytes) = bytes else {
                return Ok(None);
            };
            db.delete_cf(handle, key.as_bytes())
                .map_err(|e| KeyscoutError::Storage(format!("delete failed: {}", e)))?;
            match decode_entry(&bytes) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    warn!("removed undecodable record {}: {}", key, e);
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn touch(&self, key: &str) -> Result<()> {
        let cf = cf_for_key(key)?;
        let key = key.to_string();
        self.run_blocking(move |db| {
            let handle = db
                .cf_handle(cf)
                .ok_or_else(|| KeyscoutError::Storage(format!("missing column family {}", cf)))?;
            let bytes = db
                .get_cf(handle, key.as_bytes())
                .map_err(|e| KeyscoutError::Storage(format!("read failed: {}", e)))?;
            if let Some(bytes) = bytes {
                let mut entry = decode_entry(&bytes)?;
                entry.touch();
                let updated = encode_entry(&entry)?;
                db.put_cf(handle, key.as_bytes(), &updated)
                    .map_err(|e| KeyscoutError::Storage(format!("write failed: {}", e)))?;
            }
            Ok(())
        })
        .await
    }

    async fn meta(&self) -> Result<Vec<EntryMeta>> {
        self.run_blocking(move |db| {
            let mut out = Vec::new();
            for dt in DataType::ALL {
                let handle = db.cf_handle(cf_name(dt)).ok_or_else(|| {
                    KeyscoutError::Storage(format!("missing column family {}", cf_name(dt)))
                })?;
                for item in db.iterator_cf(handle, IteratorMode::Start) {
                    let (key, bytes) =
                        item.map_err(|e| KeyscoutError::Storage(format!("scan failed: {}", e)))?;
                    match decode_entry(&bytes) {
                        Ok(entry) => out.push(EntryMeta {
                            key: entry.key,
                            data_type: entry.data_type,
                            expires_at: entry.expires_at,
                        }),
                        Err(e) => warn!(
                            "skipping undecodable record {}: {}",
                            String::from_utf8_lossy(&key),
                            e
                        ),
                    }
                }
            }
            Ok(out)
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.run_blocking(move |db| {
            for dt in DataType::ALL {
                let handle = db.cf_handle(cf_name(dt)).ok_or_else(|| {
                    KeyscoutError::Storage(format!("missing column family {}", cf_name(dt)))
                })?;
                let mut batch = WriteBatch::default();
                for item in db.iterator_cf(handle, IteratorMode::Start) {
                    let (key, _) =
                        item.map_err(|e| KeyscoutError::Storage(format!("scan failed: {}", e)))?;
                    batch.delete_cf(handle, key);
                }
                db.write(batch)
                    .map_err(|e| KeyscoutError::Storage(format!("clear failed: {}", e)))?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keyscout_core::{CachePayload, SerpEntry, SerpResult};
    use std::collections::HashSet;

    fn serp_entry(key: &str) -> CacheEntry {
        CacheEntry::new(
            key,
            CachePayload::SerpResult(SerpResult {
                keyword: "standing desk".into(),
                entries: vec![SerpEntry {
                    title: "Standing Desk Buyer Guide".into(),
                    url: "https://example.com/desks".into(),
                    snippet: "Compare frames and tops".into(),
                    position: 1,
                }],
                fetched_at: chrono::Utc::now(),
            }),
            Duration::hours(12),
            HashSet::new(),
        )
    }

    #[tokio::test]
    async fn round_trip_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDurableStore::open(dir.path()).unwrap();
        let entry = serp_entry("serp:roundtrip");

        store.put(entry.clone()).await.unwrap();
        let got = store.get("serp:roundtrip").await.unwrap().unwrap();
        assert_eq!(got.payload, entry.payload);

        let meta = store.meta().await.unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].data_type, DataType::Serp);

        assert!(store.remove("serp:roundtrip").await.unwrap().is_some());
        assert!(store.get("serp:roundtrip").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksDurableStore::open(dir.path()).unwrap();
            store.put(serp_entry("serp:durable")).await.unwrap();
        }
        let store = RocksDurableStore::open(dir.path()).unwrap();
        assert!(store.get("serp:durable").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDurableStore::open(dir.path()).unwrap();
        let cf = store.db.cf_handle("serp").unwrap();
        store.db.put_cf(cf, b"serp:bad", b"scrambled").unwrap();

        let err = store.get("serp:bad").await.unwrap_err();
        assert!(matches!(err, KeyscoutError::CacheCorruption(_)));
        // touch bumps are skipped for missing keys and fail for corrupt ones
        assert!(store.touch("serp:bad").await.is_err());
    }
}
