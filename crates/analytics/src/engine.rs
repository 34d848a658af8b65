use crate::completeness::DataCompleteness;
use crate::grouping::{group_by, DimensionResult};
use crate::metrics::{trigger_breakdowns, SummaryMetrics};
use crate::report::{reconcile, AttributionSummary, SnapshotMismatch};
use core_types::{Decision, Dimension, Filter, TradeRecord};

/// A stateless calculator for deriving attribution figures from ledger records.
///
/// Ledger adapters fetch the filtered decisions and joined trade records, then hand them
/// to this engine. It never looks at storage itself, so every result is a pure function
/// of its inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the overall summary for a filter.
    ///
    /// # Arguments
    ///
    /// * `filter` - The filter the inputs were selected with; only its period is echoed back.
    /// * `decisions` - Every decision matching the filter, used for completeness.
    /// * `records` - Every trade matched to those decisions.
    pub fn summary(
        &self,
        filter: &Filter,
        decisions: &[Decision],
        records: &[TradeRecord],
    ) -> AttributionSummary {
        let overview = SummaryMetrics::from_records(records);
        tracing::debug!(
            environment = %filter.environment(),
            decisions = decisions.len(),
            trades = overview.trade_count,
            net_pnl = %overview.net_pnl,
            "Computed attribution summary"
        );

        AttributionSummary {
            period: filter.period(),
            overview,
            data_completeness: DataCompleteness::from_decisions(decisions),
            by_trigger_type: trigger_breakdowns(records),
        }
    }

    /// Breaks `records` down along one dimension. Strategy items also carry their
    /// trigger-type composition.
    pub fn breakdown(&self, dimension: Dimension, records: &[TradeRecord]) -> DimensionResult {
        group_by(records, dimension, dimension == Dimension::Strategy)
    }

    pub fn completeness(&self, decisions: &[Decision]) -> DataCompleteness {
        DataCompleteness::from_decisions(decisions)
    }

    pub fn reconcile(
        &self,
        summary: &AttributionSummary,
        dimension: Dimension,
        result: &DimensionResult,
    ) -> Option<SnapshotMismatch> {
        reconcile(dimension, &summary.overview, result)
    }
}
