use crate::error::EngineError;
use core_types::{Environment, SyncStatus};
use database::LedgerQueryPort;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where one environment's cached PnL linkage stands relative to the trade ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "unsynced_count", rename_all = "snake_case")]
pub enum SyncState {
    /// Nothing is known yet.
    #[default]
    Idle,
    Checking,
    InSync,
    NeedsSync(u64),
    Syncing,
}

impl SyncState {
    fn from_status(status: SyncStatus) -> Self {
        if status.needs_sync {
            Self::NeedsSync(status.unsynced_count)
        } else {
            Self::InSync
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::InSync => write!(f, "in-sync"),
            Self::NeedsSync(n) => write!(f, "needs-sync({n})"),
            Self::Syncing => write!(f, "syncing"),
        }
    }
}

/// The PnL-linkage auditor for a single environment.
///
/// It detects decisions whose cached PnL has drifted from the trade ledger and drives
/// the resync. The state lives behind an async mutex that is never held across a ledger
/// call, so a check can observe an in-flight repair and refuse it instead of queueing.
pub struct SyncReconciler {
    environment: Environment,
    ledger: Arc<dyn LedgerQueryPort>,
    state: Mutex<SyncState>,
}

impl SyncReconciler {
    pub fn new(environment: Environment, ledger: Arc<dyn LedgerQueryPort>) -> Self {
        Self {
            environment,
            ledger,
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub async fn state(&self) -> SyncState {
        *self.state.lock().await
    }

    async fn transition(&self, next: SyncState) {
        let mut state = self.state.lock().await;
        tracing::debug!(environment = %self.environment, from = %*state, to = %next, "Sync state transition");
        *state = next;
    }

    /// Records the outcome of a status query, but only while the state is still
    /// `Checking`. A repair that started meanwhile owns the state until it finishes.
    async fn settle(&self, next: SyncState) {
        let mut state = self.state.lock().await;
        if *state != SyncState::Checking {
            tracing::debug!(
                environment = %self.environment,
                current = %*state,
                discarded = %next,
                "Discarding a stale sync status"
            );
            return;
        }
        tracing::debug!(environment = %self.environment, from = %*state, to = %next, "Sync state transition");
        *state = next;
    }

    /// Queries the sync status and records the outcome.
    ///
    /// Rejected with `RepairInProgress` while a resync runs. On failure the previous
    /// state is restored, except that an interrupted `Checking` falls back to `Idle`.
    /// Either outcome is dropped if another task moved the state on while the query ran.
    pub async fn check(&self) -> Result<SyncStatus, EngineError> {
        let previous = {
            let mut state = self.state.lock().await;
            if *state == SyncState::Syncing {
                return Err(EngineError::RepairInProgress(self.environment));
            }
            std::mem::replace(&mut *state, SyncState::Checking)
        };

        match self.ledger.get_sync_status(self.environment).await {
            Ok(status) => {
                self.settle(SyncState::from_status(status)).await;
                tracing::info!(
                    environment = %self.environment,
                    needs_sync = status.needs_sync,
                    unsynced = status.unsynced_count,
                    "PnL sync status checked"
                );
                Ok(status)
            }
            Err(source) => {
                let restored = match previous {
                    SyncState::Checking => SyncState::Idle,
                    other => other,
                };
                self.settle(restored).await;
                tracing::error!(environment = %self.environment, error = %source, "PnL sync status check failed");
                Err(EngineError::QueryFailure {
                    query: "sync-status",
                    source,
                })
            }
        }
    }

    /// Runs the resync for an environment known to need it, then rechecks.
    pub async fn repair(&self) -> Result<SyncStatus, EngineError> {
        let unsynced_count = {
            let mut state = self.state.lock().await;
            match *state {
                SyncState::InSync => return Ok(SyncStatus::from_count(0)),
                SyncState::Syncing => return Err(EngineError::RepairInProgress(self.environment)),
                SyncState::Idle | SyncState::Checking => {
                    return Err(EngineError::SyncStatusUnknown(self.environment));
                }
                SyncState::NeedsSync(n) => {
                    *state = SyncState::Syncing;
                    n
                }
            }
        };

        tracing::info!(environment = %self.environment, unsynced = unsynced_count, "Starting PnL resync");

        if let Err(source) = self.ledger.trigger_resync(self.environment).await {
            self.transition(SyncState::NeedsSync(unsynced_count)).await;
            tracing::warn!(
                environment = %self.environment,
                unsynced = unsynced_count,
                error = %source,
                "PnL resync failed"
            );
            return Err(EngineError::RepairFailed {
                environment: self.environment,
                unsynced_count,
                source,
            });
        }

        self.transition(SyncState::Checking).await;
        self.check().await
    }

    /// Check, repair if needed, and recheck as one logical unit.
    pub async fn check_and_repair(&self) -> Result<SyncStatus, EngineError> {
        let status = self.check().await?;
        if !status.needs_sync {
            return Ok(status);
        }
        self.repair().await
    }
}
