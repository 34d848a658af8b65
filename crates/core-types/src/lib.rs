//! # Core Types
//!
//! The shared vocabulary of the attribution workspace: environments, dimensions,
//! ledger records, the time window resolver and the immutable query `Filter`.
//!
//! As a Layer 0 crate it has no knowledge of storage or transport.

pub mod enums;
pub mod error;
pub mod filter;
pub mod structs;
pub mod window;

// Re-export the core types to provide a clean public API.
pub use enums::{Dimension, Environment};
pub use error::CoreError;
pub use filter::{Filter, FilterSelection};
pub use structs::{Decision, StrategyRef, SyncStatus, Trade, TradeRecord};
pub use window::{Period, PeriodBounds, TimeWindow};
