use crate::enums::Environment;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The strategy a decision was attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyRef {
    pub id: i64,
    pub name: String,
}

/// One attributable trading decision, as recorded in the ledger.
///
/// `realized_pnl` and `fee` are the cached PnL linkage. They are denormalized from the
/// trade ledger and may drift from it until a resync runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub account_id: i64,
    #[serde(default)]
    pub strategy: Option<StrategyRef>,
    #[serde(default)]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub realized_pnl: Option<Decimal>,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// A realized fill. Linked to at most one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    #[serde(default)]
    pub decision_id: Option<i64>,
    pub symbol: String,
    pub pnl: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A trade joined to the decision that produced it. This is the unit every
/// metric and dimension breakdown is computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pnl: Decimal,
    pub fee: Decimal,
    pub symbol: Option<String>,
    pub strategy: Option<StrategyRef>,
    pub trigger_type: Option<String>,
    pub operation: Option<String>,
}

impl TradeRecord {
    pub fn join(trade: &Trade, decision: &Decision) -> Self {
        let symbol = non_empty(Some(trade.symbol.as_str()))
            .or_else(|| non_empty(decision.symbol.as_deref()));

        Self {
            pnl: trade.pnl,
            fee: trade.fee,
            symbol,
            strategy: decision.strategy.clone(),
            trigger_type: non_empty(decision.trigger_type.as_deref()),
            operation: non_empty(decision.operation.as_deref()),
        }
    }
}

/// Whether the cached PnL linkage of an environment has drifted from the trade ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub needs_sync: bool,
    #[serde(alias = "unsync_count")]
    pub unsynced_count: u64,
}

impl SyncStatus {
    pub fn from_count(unsynced_count: u64) -> Self {
        Self {
            needs_sync: unsynced_count > 0,
            unsynced_count,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn decision() -> Decision {
        Decision {
            id: 7,
            timestamp: Utc::now(),
            environment: Environment::Mainnet,
            account_id: 1,
            strategy: Some(StrategyRef { id: 3, name: "breakout".to_string() }),
            trigger_type: Some("signal".to_string()),
            realized_pnl: None,
            fee: None,
            operation: Some("  ".to_string()),
            symbol: Some("ETH".to_string()),
        }
    }

    fn trade(symbol: &str) -> Trade {
        Trade {
            id: 1,
            decision_id: Some(7),
            symbol: symbol.to_string(),
            pnl: dec!(12.5),
            fee: dec!(0.1),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_join_prefers_trade_symbol() {
        let record = TradeRecord::join(&trade("BTC"), &decision());
        assert_eq!(record.symbol.as_deref(), Some("BTC"));
        assert_eq!(record.strategy.as_ref().map(|s| s.id), Some(3));
        assert_eq!(record.pnl, dec!(12.5));
    }

    #[test]
    fn test_join_falls_back_to_decision_symbol_and_drops_blank_tags() {
        let record = TradeRecord::join(&trade(""), &decision());
        assert_eq!(record.symbol.as_deref(), Some("ETH"));
        assert_eq!(record.operation, None);
        assert_eq!(record.trigger_type.as_deref(), Some("signal"));
    }

    #[test]
    fn test_sync_status_accepts_legacy_field_name() {
        let status: SyncStatus =
            serde_json::from_str(r#"{"needs_sync":true,"unsync_count":4}"#).unwrap();
        assert_eq!(status, SyncStatus::from_count(4));
        assert!(!SyncStatus::from_count(0).needs_sync);
    }
}
