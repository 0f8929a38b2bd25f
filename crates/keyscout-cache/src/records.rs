use chrono::DateTime;
use keyscout_core::{CacheEntry, CachePayload, DataType, KeyscoutError, Result};
use serde::{Deserialize, Serialize};

/// Durable-tier record layout. Timestamps are unix seconds and the
/// payload is kept as serialized JSON so schema drift in one payload
/// variant cannot poison unrelated records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCacheEntry {
    pub cache_key: String,
    pub data_type: DataType,
    pub payload: Vec<u8>,
    pub created_at: i64,
    pub expires_at: i64,
    pub access_count: u64,
    pub depends_on: Vec<String>,
}

pub fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&entry.payload)?;
    let stored = StoredCacheEntry {
        cache_key: entry.key.clone(),
        data_type: entry.data_type,
        payload,
        created_at: entry.created_at.timestamp(),
        expires_at: entry.expires_at.timestamp(),
        access_count: entry.access_count,
        depends_on: entry.depends_on.iter().cloned().collect(),
    };
    bincode::serde::encode_to_vec(&stored, bincode::config::standard())
        .map_err(|e| KeyscoutError::Storage(format!("record encoding failed: {}", e)))
}

pub fn decode_entry(bytes: &[u8]) -> Result<CacheEntry> {
    let (stored, _): (StoredCacheEntry, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| KeyscoutError::CacheCorruption(format!("undecodable record: {}", e)))?;

    let payload: CachePayload = serde_json::from_slice(&stored.payload).map_err(|e| {
        KeyscoutError::CacheCorruption(format!(
            "undecodable payload for {}: {}",
            stored.cache_key, e
        ))
    })?;

    if payload.data_type() != stored.data_type {
        return Err(KeyscoutError::CacheCorruption(format!(
            "payload kind {} does not match record type {} for {}",
            payload.data_type(),
            stored.data_type,
            stored.cache_key
        )));
    }

    let created_at = DateTime::from_timestamp(stored.created_at, 0).ok_or_else(|| {
        KeyscoutError::CacheCorruption(format!("bad created_at in {}", stored.cache_key))
    })?;
    let expires_at = DateTime::from_timestamp(stored.expires_at, 0).ok_or_else(|| {
        KeyscoutError::CacheCorruption(format!("bad expires_at in {}", stored.cache_key))
    })?;

    Ok(CacheEntry {
        key: stored.cache_key,
        data_type: stored.data_type,
        payload,
        created_at,
        expires_at,
        access_count: stored.access_count,
        depends_on: stored.depends_on.into_iter().collect(),
    })
}
