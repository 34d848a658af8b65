use crate::error::DbError;
use crate::ledger::LedgerQueryPort;
use analytics::{AnalyticsEngine, AttributionSummary, DimensionResult};
use async_trait::async_trait;
use core_types::{Decision, Dimension, Environment, Filter, SyncStatus, Trade, TradeRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// A serializable copy of the ledger: every decision and every trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl LedgerSnapshot {
    fn decisions_matching(&self, filter: &Filter) -> Vec<Decision> {
        self.decisions
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    /// Inner join of trades onto the matching decisions, in ledger order.
    fn records_matching(&self, filter: &Filter) -> Vec<TradeRecord> {
        let decisions: HashMap<i64, &Decision> = self
            .decisions
            .iter()
            .filter(|d| filter.matches(d))
            .map(|d| (d.id, d))
            .collect();

        self.trades
            .iter()
            .filter_map(|trade| {
                let decision = decisions.get(&trade.decision_id?)?;
                Some(TradeRecord::join(trade, decision))
            })
            .collect()
    }

    /// Per-decision `(pnl, fee)` totals over the trade ledger.
    fn trade_totals(&self) -> HashMap<i64, (Decimal, Decimal)> {
        let mut totals: HashMap<i64, (Decimal, Decimal)> = HashMap::new();
        for trade in &self.trades {
            if let Some(decision_id) = trade.decision_id {
                let entry = totals.entry(decision_id).or_default();
                entry.0 += trade.pnl;
                entry.1 += trade.fee;
            }
        }
        totals
    }

    fn is_stale(decision: &Decision, totals: &HashMap<i64, (Decimal, Decimal)>) -> bool {
        match totals.get(&decision.id) {
            Some((pnl, fee)) => decision.realized_pnl != Some(*pnl) || decision.fee != Some(*fee),
            // Decisions without trades have nothing to link yet.
            None => false,
        }
    }
}

/// A ledger held entirely in memory. Backs the CLI's `--ledger-file` mode and the
/// service-level tests.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    snapshot: RwLock<LedgerSnapshot>,
    analytics: AnalyticsEngine,
}

impl InMemoryLedger {
    pub fn new(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            analytics: AnalyticsEngine::new(),
        }
    }

    /// Loads a ledger exported as JSON (`{"decisions": [...], "trades": [...]}`).
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            decisions = snapshot.decisions.len(),
            trades = snapshot.trades.len(),
            "Loaded ledger snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// A copy of the current ledger contents.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Writes the current contents back out, e.g. after a resync.
    pub async fn save_json_file(&self, path: impl AsRef<Path>) -> Result<(), DbError> {
        let json = serde_json::to_string_pretty(&*self.snapshot.read().await)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerQueryPort for InMemoryLedger {
    async fn get_summary(&self, filter: &Filter) -> Result<AttributionSummary, DbError> {
        let snapshot = self.snapshot.read().await;
        let decisions = snapshot.decisions_matching(filter);
        let records = snapshot.records_matching(filter);
        Ok(self.analytics.summary(filter, &decisions, &records))
    }

    async fn get_by_dimension(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, DbError> {
        let records = self.snapshot.read().await.records_matching(filter);
        Ok(self.analytics.breakdown(dimension, &records))
    }

    async fn get_sync_status(&self, environment: Environment) -> Result<SyncStatus, DbError> {
        let snapshot = self.snapshot.read().await;
        let totals = snapshot.trade_totals();
        let unsynced = snapshot
            .decisions
            .iter()
            .filter(|d| d.environment == environment)
            .filter(|d| LedgerSnapshot::is_stale(d, &totals))
            .count();
        Ok(SyncStatus::from_count(unsynced as u64))
    }

    async fn trigger_resync(&self, environment: Environment) -> Result<(), DbError> {
        let mut snapshot = self.snapshot.write().await;
        let totals = snapshot.trade_totals();

        let mut updated = 0usize;
        for decision in snapshot
            .decisions
            .iter_mut()
            .filter(|d| d.environment == environment)
        {
            if let Some((pnl, fee)) = totals.get(&decision.id) {
                if decision.realized_pnl != Some(*pnl) || decision.fee != Some(*fee) {
                    decision.realized_pnl = Some(*pnl);
                    decision.fee = Some(*fee);
                    updated += 1;
                }
            }
        }

        tracing::info!(%environment, updated, "Recomputed cached PnL linkage from the trade ledger");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::StrategyRef;
    use rust_decimal_macros::dec;

    fn decision(id: i64, environment: Environment, account_id: i64, cached: Option<Decimal>) -> Decision {
        Decision {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 5, id as u32, 10, 0, 0).unwrap(),
            environment,
            account_id,
            strategy: Some(StrategyRef { id: 1, name: "momentum".to_string() }),
            trigger_type: Some("signal".to_string()),
            realized_pnl: cached,
            fee: cached.map(|_| dec!(1)),
            operation: Some("close".to_string()),
            symbol: Some("BTC".to_string()),
        }
    }

    fn trade(id: i64, decision_id: Option<i64>, pnl: Decimal) -> Trade {
        Trade {
            id,
            decision_id,
            symbol: "BTC".to_string(),
            pnl,
            fee: dec!(1),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap(),
        }
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(LedgerSnapshot {
            decisions: vec![
                decision(1, Environment::Testnet, 1, Some(dec!(10))),
                decision(2, Environment::Testnet, 2, None),
                decision(3, Environment::Mainnet, 1, Some(dec!(7))),
                decision(4, Environment::Testnet, 1, None),
            ],
            trades: vec![
                trade(1, Some(1), dec!(10)),
                trade(2, Some(2), dec!(-3)),
                trade(3, Some(3), dec!(7)),
                trade(4, None, dec!(100)),
            ],
        })
    }

    #[tokio::test]
    async fn test_summary_scopes_to_environment_and_account() {
        let ledger = ledger();
        let filter = Filter::new(Environment::Testnet, Some(1), None).unwrap();

        let summary = ledger.get_summary(&filter).await.unwrap();
        assert_eq!(summary.overview.trade_count, 1);
        assert_eq!(summary.overview.total_pnl, dec!(10));
        // Decision 4 has no trades but still counts toward completeness.
        assert_eq!(summary.data_completeness.total_decisions, 2);

        let all = ledger
            .get_summary(&Filter::for_environment(Environment::Testnet))
            .await
            .unwrap();
        // The unlinked trade is never attributed.
        assert_eq!(all.overview.trade_count, 2);
    }

    #[tokio::test]
    async fn test_dimension_totals_match_summary() {
        let ledger = ledger();
        let filter = Filter::for_environment(Environment::Testnet);
        let summary = ledger.get_summary(&filter).await.unwrap();

        for dimension in Dimension::ALL {
            let result = ledger.get_by_dimension(dimension, &filter).await.unwrap();
            let (count, net) = result.totals();
            assert_eq!(count, summary.overview.trade_count);
            assert_eq!(net, summary.overview.net_pnl);
        }
    }

    #[tokio::test]
    async fn test_resync_clears_stale_decisions_in_one_environment() {
        let ledger = ledger();

        // Decision 1 is cached correctly; decision 2 has trades but no cache.
        let status = ledger.get_sync_status(Environment::Testnet).await.unwrap();
        assert_eq!(status, SyncStatus::from_count(1));
        assert!(!ledger.get_sync_status(Environment::Mainnet).await.unwrap().needs_sync);

        ledger.trigger_resync(Environment::Testnet).await.unwrap();
        assert!(!ledger.get_sync_status(Environment::Testnet).await.unwrap().needs_sync);

        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.decisions[1].realized_pnl, Some(dec!(-3)));
        assert_eq!(snapshot.decisions[3].realized_pnl, None);
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let path = std::env::temp_dir().join(format!("ledger-{}.json", std::process::id()));
        ledger().save_json_file(&path).await.unwrap();

        let loaded = InMemoryLedger::from_json_file(&path).await.unwrap();
        assert_eq!(loaded.snapshot().await, ledger().snapshot().await);

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(
            InMemoryLedger::from_json_file(&path).await,
            Err(DbError::Io(_))
        ));
    }
}
