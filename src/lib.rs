pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `batchflow::store` instead of `batchflow::core::store`
pub use core::*;
pub use utils::*;
