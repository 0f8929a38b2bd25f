pub mod engine;
pub mod request;

pub use engine::*;
pub use request::*;

// Re-export common types for convenience
pub use keyscout_cache::{CacheManager, CacheStatsSnapshot};
pub use keyscout_core::{KeyscoutError, KeywordCandidate, Result, Settings};
pub use keyscout_limiter::{RateLimiter, UsageReport};
