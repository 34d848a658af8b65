//! # Attribution Engine
//!
//! The orchestration layer: it fans a single filter out to the ledger, gathers the
//! summary and the four dimension breakdowns as one batch, and owns the per-environment
//! PnL sync state machines.
//!
//! ## Architectural Principles
//!
//! - **Depends on the Port, not the Store:** the engine only sees `Arc<dyn LedgerQueryPort>`.
//!   PostgreSQL, an in-memory snapshot and test fakes are interchangeable.
//! - **All or Nothing:** the five queries of a batch run concurrently; the first failure
//!   cancels the rest, and no partially populated report ever escapes.
//! - **Last Filter Wins:** `AttributionView` cancels a superseded batch and never publishes
//!   a result computed for a stale filter.

use analytics::{AnalyticsEngine, AttributionSummary, DimensionResult, SnapshotMismatch};
use configuration::AttributionConfig;
use core_types::{Dimension, Environment, Filter, FilterSelection, SyncStatus};
use database::LedgerQueryPort;
use serde::Serialize;
use std::sync::Arc;

pub mod error;
pub mod reconciler;
pub mod view;

#[cfg(test)]
pub(crate) mod fake;

pub use error::EngineError;
pub use reconciler::{SyncReconciler, SyncState};
pub use view::AttributionView;

/// The name a dimension query is reported under in a `QueryFailure`.
pub(crate) fn query_name(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Symbol => "by-symbol",
        Dimension::Strategy => "by-strategy",
        Dimension::TriggerType => "by-trigger-type",
        Dimension::Operation => "by-operation",
    }
}

/// One complete, consistent batch of attribution results for a single filter.
#[derive(Debug, Clone, Serialize)]
pub struct AttributionReport {
    pub filter: Filter,
    pub summary: AttributionSummary,
    pub by_symbol: DimensionResult,
    pub by_strategy: DimensionResult,
    pub by_trigger_type: DimensionResult,
    pub by_operation: DimensionResult,
    /// Dimensions whose totals disagree with the summary. Empty for a consistent batch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<SnapshotMismatch>,
}

impl AttributionReport {
    pub fn dimension(&self, dimension: Dimension) -> &DimensionResult {
        match dimension {
            Dimension::Symbol => &self.by_symbol,
            Dimension::Strategy => &self.by_strategy,
            Dimension::TriggerType => &self.by_trigger_type,
            Dimension::Operation => &self.by_operation,
        }
    }

    /// Promotes the first snapshot mismatch, if any, to a hard error.
    pub fn ensure_consistent(self) -> Result<Self, EngineError> {
        match self.mismatches.first() {
            Some(mismatch) => Err(EngineError::InconsistentSnapshot(mismatch.clone())),
            None => Ok(self),
        }
    }
}

/// The query façade in front of the ledger.
pub struct AttributionService {
    ledger: Arc<dyn LedgerQueryPort>,
    settings: AttributionConfig,
    analytics: AnalyticsEngine,
    testnet_sync: SyncReconciler,
    mainnet_sync: SyncReconciler,
}

impl AttributionService {
    pub fn new(ledger: Arc<dyn LedgerQueryPort>, settings: AttributionConfig) -> Self {
        Self {
            testnet_sync: SyncReconciler::new(Environment::Testnet, ledger.clone()),
            mainnet_sync: SyncReconciler::new(Environment::Mainnet, ledger.clone()),
            ledger,
            settings,
            analytics: AnalyticsEngine::new(),
        }
    }

    pub fn settings(&self) -> &AttributionConfig {
        &self.settings
    }

    /// The selection used when a caller names nothing but, at most, an environment.
    pub fn default_selection(&self, environment: Option<Environment>) -> FilterSelection {
        FilterSelection {
            environment: environment.unwrap_or(self.settings.default_environment),
            account_id: None,
            period: self.settings.default_period,
        }
    }

    /// Loads the summary and all four breakdowns for `filter` as one batch.
    ///
    /// The queries run concurrently against the same filter value. The first failure
    /// cancels the others and is returned as a single `QueryFailure`.
    pub async fn load_attribution(&self, filter: Filter) -> Result<AttributionReport, EngineError> {
        let ledger = self.ledger.as_ref();

        let (summary, by_symbol, by_strategy, by_trigger_type, by_operation) = tokio::try_join!(
            async {
                ledger
                    .get_summary(&filter)
                    .await
                    .map_err(EngineError::query("summary"))
            },
            Self::fetch_dimension(ledger, Dimension::Symbol, &filter),
            Self::fetch_dimension(ledger, Dimension::Strategy, &filter),
            Self::fetch_dimension(ledger, Dimension::TriggerType, &filter),
            Self::fetch_dimension(ledger, Dimension::Operation, &filter),
        )
        .inspect_err(|e| {
            tracing::error!(environment = %filter.environment(), error = %e, "Attribution batch failed");
        })?;

        let mut report = AttributionReport {
            filter,
            summary,
            by_symbol,
            by_strategy,
            by_trigger_type,
            by_operation,
            mismatches: Vec::new(),
        };

        if self.settings.verify_consistency {
            report.mismatches = Dimension::ALL
                .into_iter()
                .filter_map(|dimension| {
                    self.analytics
                        .reconcile(&report.summary, dimension, report.dimension(dimension))
                })
                .collect();
            for mismatch in &report.mismatches {
                tracing::warn!(environment = %filter.environment(), %mismatch, "Attribution snapshot mismatch");
            }
        }

        tracing::info!(
            environment = %filter.environment(),
            account_id = ?filter.account_id(),
            start = ?filter.start_date(),
            end = ?filter.end_date(),
            trades = report.summary.overview.trade_count,
            net_pnl = %report.summary.overview.net_pnl,
            "Attribution batch loaded"
        );
        Ok(report)
    }

    /// Resolves the selection's period exactly once, then loads the batch.
    pub async fn load_selection(
        &self,
        selection: FilterSelection,
    ) -> Result<AttributionReport, EngineError> {
        let filter = selection.resolve()?;
        self.load_attribution(filter).await
    }

    async fn fetch_dimension(
        ledger: &dyn LedgerQueryPort,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, EngineError> {
        ledger
            .get_by_dimension(dimension, filter)
            .await
            .map_err(EngineError::query(query_name(dimension)))
    }

    pub async fn summary(&self, filter: &Filter) -> Result<AttributionSummary, EngineError> {
        self.ledger
            .get_summary(filter)
            .await
            .map_err(EngineError::query("summary"))
    }

    pub async fn by_dimension(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, EngineError> {
        Self::fetch_dimension(self.ledger.as_ref(), dimension, filter).await
    }

    pub fn reconciler(&self, environment: Environment) -> &SyncReconciler {
        match environment {
            Environment::Testnet => &self.testnet_sync,
            Environment::Mainnet => &self.mainnet_sync,
        }
    }

    /// Rechecks the environment's sync status and records it in its state machine.
    pub async fn sync_status(&self, environment: Environment) -> Result<SyncStatus, EngineError> {
        self.reconciler(environment).check().await
    }

    pub async fn check_and_repair_sync(
        &self,
        environment: Environment,
    ) -> Result<SyncStatus, EngineError> {
        self.reconciler(environment).check_and_repair().await
    }
}
