use analytics::SnapshotMismatch;
use core_types::{CoreError, Environment};
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// One ledger query failed; the whole batch is discarded.
    #[error("Ledger query '{query}' failed: {source}")]
    QueryFailure {
        query: &'static str,
        #[source]
        source: DbError,
    },

    #[error("Inconsistent snapshot: {0}")]
    InconsistentSnapshot(SnapshotMismatch),

    #[error("A PnL resync is already running for {0}")]
    RepairInProgress(Environment),

    #[error("PnL resync for {environment} failed with {unsynced_count} decision(s) still unsynced: {source}")]
    RepairFailed {
        environment: Environment,
        unsynced_count: u64,
        #[source]
        source: DbError,
    },

    #[error("Sync status for {0} is unknown; run a check first")]
    SyncStatusUnknown(Environment),

    #[error("Attribution load was superseded by a newer filter")]
    Superseded,

    #[error("Invalid input: {0}")]
    Core(#[from] CoreError),
}

impl EngineError {
    pub(crate) fn query(query: &'static str) -> impl FnOnce(DbError) -> Self {
        move |source| Self::QueryFailure { query, source }
    }
}
