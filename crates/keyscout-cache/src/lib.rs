pub mod key;
pub mod manager;
pub mod records;
pub mod stats;
pub mod tiers;

#[cfg(feature = "persistent")]
pub mod rocks;

pub use key::*;
pub use manager::*;
pub use records::*;
pub use stats::*;
pub use tiers::*;

#[cfg(feature = "persistent")]
pub use rocks::*;

// Re-export common types for convenience
pub use keyscout_core::{CacheEntry, CachePayload, DataType, KeyscoutError, Result};
