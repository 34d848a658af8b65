//! # Attribution Analytics
//!
//! Pure calculation of attribution figures from ledger records. It acts as the
//! "unbiased judge" of realized performance.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems
//!   and depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** `AnalyticsEngine` and the functions behind it take records as
//!   input and produce values as output. Identical input always yields identical output.
//!
//! ## Public API
//!
//! - `SummaryMetrics` / `MetricAccumulator`: the metric aggregator.
//! - `group_by` / `DimensionResult`: the dimension grouper, with the unattributed bucket.
//! - `DataCompleteness`: the completeness calculator.
//! - `AttributionSummary` / `SnapshotMismatch`: the summary payload and the cross-check.

pub mod completeness;
pub mod engine;
pub mod grouping;
pub mod metrics;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use completeness::DataCompleteness;
pub use engine::AnalyticsEngine;
pub use grouping::{group_by, DimensionItem, DimensionKey, DimensionResult, UnattributedBucket};
pub use metrics::{
    trigger_breakdowns, MetricAccumulator, SummaryMetrics, TriggerBreakdown, TriggerBreakdowns,
    UNKNOWN_TRIGGER,
};
pub use report::{reconcile, AttributionSummary, SnapshotMismatch};
