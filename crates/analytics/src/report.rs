use crate::completeness::DataCompleteness;
use crate::grouping::DimensionResult;
use crate::metrics::{SummaryMetrics, TriggerBreakdowns};
use core_types::{Dimension, PeriodBounds};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall view of a filter: headline metrics, completeness and trigger mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionSummary {
    pub period: PeriodBounds,
    pub overview: SummaryMetrics,
    pub data_completeness: DataCompleteness,
    pub by_trigger_type: TriggerBreakdowns,
}

/// A dimension breakdown whose totals disagree with the summary of the same filter.
///
/// This only happens when the ledger served the queries from different snapshots,
/// so it is reported as-is and never corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMismatch {
    pub dimension: Dimension,
    pub expected_trade_count: usize,
    pub actual_trade_count: usize,
    pub expected_net_pnl: Decimal,
    pub actual_net_pnl: Decimal,
}

impl fmt::Display for SnapshotMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "by-{} totals {} trades / {} net do not match summary {} trades / {} net",
            self.dimension,
            self.actual_trade_count,
            self.actual_net_pnl,
            self.expected_trade_count,
            self.expected_net_pnl
        )
    }
}

/// Checks that `result` accounts for exactly the trades and net PnL of `overview`.
pub fn reconcile(
    dimension: Dimension,
    overview: &SummaryMetrics,
    result: &DimensionResult,
) -> Option<SnapshotMismatch> {
    let (count, net) = result.totals();
    if count == overview.trade_count && net == overview.net_pnl {
        return None;
    }
    Some(SnapshotMismatch {
        dimension,
        expected_trade_count: overview.trade_count,
        actual_trade_count: count,
        expected_net_pnl: overview.net_pnl,
        actual_net_pnl: net,
    })
}
