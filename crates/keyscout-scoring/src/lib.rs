pub mod intent;
pub mod scorer;

pub use intent::*;
pub use scorer::*;
