use crate::types::{CacheEntry, EntryMeta, GenerationRequest, RawCandidate, SerpEntry};
use crate::Result;
use async_trait::async_trait;

/// Upstream service proposing raw keyword tuples for a topic. Fallible
/// and possibly slow; callers bound it with a timeout and retries.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCandidate>>;
}

/// Live search-results provider. Failures here are never fatal to a
/// request; the pipeline degrades to heuristic-only scoring.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn top_results(
        &self,
        keyword: &str,
        region: &str,
        language: &str,
    ) -> Result<Vec<SerpEntry>>;
}

/// Process-scoped cache tier. May start empty; loss of contents is
/// acceptable at any time.
#[async_trait]
pub trait FastStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, entry: CacheEntry) -> Result<()>;
    /// Remove and return the entry, if present.
    async fn remove(&self, key: &str) -> Result<Option<CacheEntry>>;
    /// Bump the entry's access count without extending its TTL.
    async fn touch(&self, key: &str) -> Result<()>;
    async fn meta(&self) -> Result<Vec<EntryMeta>>;
    async fn clear(&self) -> Result<()>;
}

/// Durable cache tier, surviving process restarts. Reads may surface
/// `CacheCorruption` for records that no longer deserialize; the cache
/// manager treats those as misses and deletes them.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, entry: CacheEntry) -> Result<()>;
    /// Remove and return the entry, if present and still readable.
    async fn remove(&self, key: &str) -> Result<Option<CacheEntry>>;
    /// Bump the persisted access count without extending the TTL.
    async fn touch(&self, key: &str) -> Result<()>;
    async fn meta(&self) -> Result<Vec<EntryMeta>>;
    async fn clear(&self) -> Result<()>;
}
