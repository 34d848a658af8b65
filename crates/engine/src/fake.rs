//! A scriptable ledger for exercising the engine without a database.

use crate::query_name;
use analytics::{AttributionSummary, DimensionResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use core_types::{Decision, Dimension, Environment, Filter, StrategyRef, SyncStatus, Trade};
use database::{DbError, InMemoryLedger, LedgerQueryPort, LedgerSnapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) const SLOW_ACCOUNT: i64 = 7;

pub(crate) struct FakeLedger {
    inner: InMemoryLedger,
    failing_query: Option<&'static str>,
    skewed: Option<Dimension>,
    sync_counts: Mutex<VecDeque<u64>>,
    sync_delays: Mutex<VecDeque<Duration>>,
    sync_status_fails: AtomicBool,
    resync_fails: bool,
    resync_gate: Option<Arc<Notify>>,
    resync_delay: Option<Duration>,
    entered: Arc<Notify>,
    resync_calls: AtomicUsize,
    resyncs_running: AtomicUsize,
    peak_resyncs: AtomicUsize,
}

fn decision(id: i64, account_id: i64, strategy: Option<i64>, trigger: Option<&str>) -> Decision {
    Decision {
        id,
        timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        environment: Environment::Mainnet,
        account_id,
        strategy: strategy.map(|id| StrategyRef { id, name: format!("strategy-{id}") }),
        trigger_type: trigger.map(str::to_string),
        realized_pnl: None,
        fee: None,
        operation: Some("close".to_string()),
        symbol: None,
    }
}

fn trade(id: i64, decision_id: i64, symbol: &str, pnl: Decimal, fee: Decimal) -> Trade {
    Trade {
        id,
        decision_id: Some(decision_id),
        symbol: symbol.to_string(),
        pnl,
        fee,
        timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap(),
    }
}

/// Three mainnet trades for account 1 plus a trade for the slow account.
pub(crate) fn sample_snapshot() -> LedgerSnapshot {
    LedgerSnapshot {
        decisions: vec![
            decision(1, 1, Some(1), Some("signal")),
            decision(2, 1, Some(2), Some("scheduled")),
            decision(3, 1, None, None),
            decision(4, SLOW_ACCOUNT, Some(1), Some("signal")),
        ],
        trades: vec![
            trade(1, 1, "BTC", dec!(100), dec!(1)),
            trade(2, 2, "ETH", dec!(-40), dec!(1)),
            trade(3, 3, "BTC", dec!(0), dec!(0)),
            trade(4, 4, "SOL", dec!(5), dec!(0.5)),
        ],
    }
}

impl FakeLedger {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryLedger::new(sample_snapshot()),
            failing_query: None,
            skewed: None,
            sync_counts: Mutex::new(VecDeque::new()),
            sync_delays: Mutex::new(VecDeque::new()),
            sync_status_fails: AtomicBool::new(false),
            resync_fails: false,
            resync_gate: None,
            resync_delay: None,
            entered: Arc::new(Notify::new()),
            resync_calls: AtomicUsize::new(0),
            resyncs_running: AtomicUsize::new(0),
            peak_resyncs: AtomicUsize::new(0),
        }
    }

    /// Makes the named query (`"summary"`, `"by-symbol"`, ...) fail.
    pub(crate) fn failing(mut self, query: &'static str) -> Self {
        self.failing_query = Some(query);
        self
    }

    /// Drops the first item of one dimension so it no longer reconciles with the summary.
    pub(crate) fn skewed(mut self, dimension: Dimension) -> Self {
        self.skewed = Some(dimension);
        self
    }

    /// Successive `get_sync_status` answers; once drained, the ledger reports in sync.
    pub(crate) fn with_sync_counts(self, counts: impl IntoIterator<Item = u64>) -> Self {
        *self.sync_counts.lock().unwrap() = counts.into_iter().collect();
        self
    }

    /// Per-call latency of successive `get_sync_status` answers, paired with the counts.
    pub(crate) fn with_sync_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        *self.sync_delays.lock().unwrap() = delays.into_iter().collect();
        self
    }

    pub(crate) fn slow_resync(mut self, delay: Duration) -> Self {
        self.resync_delay = Some(delay);
        self
    }

    pub(crate) fn failing_resync(mut self) -> Self {
        self.resync_fails = true;
        self
    }

    /// Holds every resync until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.resync_gate = Some(gate);
        self
    }

    pub(crate) fn fail_sync_status(&self) {
        self.sync_status_fails.store(true, Ordering::SeqCst);
    }

    /// Notified when a gated resync or a slow-account query has started.
    pub(crate) fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub(crate) fn resync_calls(&self) -> usize {
        self.resync_calls.load(Ordering::SeqCst)
    }

    /// The most resyncs that were ever running at the same time.
    pub(crate) fn peak_resyncs(&self) -> usize {
        self.peak_resyncs.load(Ordering::SeqCst)
    }

    fn unreachable() -> DbError {
        DbError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "ledger unreachable"))
    }
}

#[async_trait]
impl LedgerQueryPort for FakeLedger {
    async fn get_summary(&self, filter: &Filter) -> Result<AttributionSummary, DbError> {
        if filter.account_id() == Some(SLOW_ACCOUNT) {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
        if self.failing_query == Some("summary") {
            return Err(Self::unreachable());
        }
        self.inner.get_summary(filter).await
    }

    async fn get_by_dimension(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, DbError> {
        if self.failing_query == Some(query_name(dimension)) {
            return Err(Self::unreachable());
        }
        let mut result = self.inner.get_by_dimension(dimension, filter).await?;
        if self.skewed == Some(dimension) && !result.items.is_empty() {
            result.items.remove(0);
        }
        Ok(result)
    }

    async fn get_sync_status(&self, _environment: Environment) -> Result<SyncStatus, DbError> {
        if self.sync_status_fails.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        // The answer is fixed when the query starts, however long it takes to arrive.
        let count = self.sync_counts.lock().unwrap().pop_front().unwrap_or(0);
        let delay = self.sync_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(SyncStatus::from_count(count))
    }

    async fn trigger_resync(&self, _environment: Environment) -> Result<(), DbError> {
        self.resync_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.resyncs_running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_resyncs.fetch_max(running, Ordering::SeqCst);

        if let Some(gate) = &self.resync_gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        if let Some(delay) = self.resync_delay {
            tokio::time::sleep(delay).await;
        }

        self.resyncs_running.fetch_sub(1, Ordering::SeqCst);
        if self.resync_fails {
            return Err(Self::unreachable());
        }
        Ok(())
    }
}
