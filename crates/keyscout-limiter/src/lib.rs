pub mod limiter;

pub use limiter::*;

// Re-export common types for convenience
pub use keyscout_core::{OpQuota, OperationClass, Plan, QuotaConfig};
