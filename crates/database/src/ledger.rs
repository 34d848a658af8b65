use crate::error::DbError;
use analytics::{AttributionSummary, DimensionResult};
use async_trait::async_trait;
use core_types::{Dimension, Environment, Filter, SyncStatus};

/// The read interface over the decision/trade ledger, plus its one mutating operation.
///
/// This trait is the contract the attribution engine consumes, so the backing store
/// (PostgreSQL or in-memory) can be swapped out. Every read is a pure function of the
/// filter and the ledger state at the time of the call.
#[async_trait]
pub trait LedgerQueryPort: Send + Sync {
    /// Overall metrics, data completeness and trigger mix for the filter.
    async fn get_summary(&self, filter: &Filter) -> Result<AttributionSummary, DbError>;

    /// Breakdown of the filter's trades along one dimension.
    async fn get_by_dimension(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, DbError>;

    /// Number of decisions whose cached PnL linkage disagrees with the trade ledger.
    /// Scoped to the environment only, never to an account.
    async fn get_sync_status(&self, environment: Environment) -> Result<SyncStatus, DbError>;

    /// Recomputes and persists the cached PnL linkage for an environment.
    async fn trigger_resync(&self, environment: Environment) -> Result<(), DbError>;
}
