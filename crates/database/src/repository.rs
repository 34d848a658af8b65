use crate::error::DbError;
use crate::ledger::LedgerQueryPort;
use analytics::{AnalyticsEngine, AttributionSummary, DimensionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Decision, Dimension, Environment, Filter, StrategyRef, SyncStatus, Trade, TradeRecord,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgExecutor, PgPool};
use sqlx::FromRow;

const SELECT_DECISIONS: &str = r#"
    SELECT
        d.id, d.created_at, d.environment, d.account_id, d.strategy_id, s.name AS strategy_name,
        d.trigger_type, d.realized_pnl, d.fee, d.operation, d.symbol
    FROM decisions AS d
    LEFT JOIN strategies AS s ON s.id = d.strategy_id
    WHERE d.environment = $1
      AND ($2::BIGINT IS NULL OR d.account_id = $2)
      AND ($3::TIMESTAMPTZ IS NULL OR d.created_at >= $3)
      AND ($4::TIMESTAMPTZ IS NULL OR d.created_at < $4)
    ORDER BY d.created_at, d.id
"#;

const SELECT_TRADE_RECORDS: &str = r#"
    SELECT
        t.id AS trade_id, t.symbol AS trade_symbol, t.pnl, t.fee AS trade_fee, t.executed_at,
        d.id, d.created_at, d.environment, d.account_id, d.strategy_id, s.name AS strategy_name,
        d.trigger_type, d.realized_pnl, d.fee, d.operation, d.symbol
    FROM trades AS t
    JOIN decisions AS d ON d.id = t.decision_id
    LEFT JOIN strategies AS s ON s.id = d.strategy_id
    WHERE d.environment = $1
      AND ($2::BIGINT IS NULL OR d.account_id = $2)
      AND ($3::TIMESTAMPTZ IS NULL OR d.created_at >= $3)
      AND ($4::TIMESTAMPTZ IS NULL OR d.created_at < $4)
    ORDER BY t.executed_at, t.id
"#;

// A decision is stale when its cached PnL or fee differs from the sum over its trades.
const COUNT_UNSYNCED: &str = r#"
    SELECT COUNT(*)
    FROM decisions AS d
    JOIN (
        SELECT decision_id, SUM(pnl) AS pnl, SUM(fee) AS fee
        FROM trades
        WHERE decision_id IS NOT NULL
        GROUP BY decision_id
    ) AS t ON t.decision_id = d.id
    WHERE d.environment = $1
      AND (d.realized_pnl IS DISTINCT FROM t.pnl OR d.fee IS DISTINCT FROM t.fee)
"#;

const RESYNC_PNL: &str = r#"
    UPDATE decisions AS d
    SET realized_pnl = t.pnl, fee = t.fee
    FROM (
        SELECT decision_id, SUM(pnl) AS pnl, SUM(fee) AS fee
        FROM trades
        WHERE decision_id IS NOT NULL
        GROUP BY decision_id
    ) AS t
    WHERE t.decision_id = d.id
      AND d.environment = $1
      AND (d.realized_pnl IS DISTINCT FROM t.pnl OR d.fee IS DISTINCT FROM t.fee)
"#;

/// The PostgreSQL-backed ledger. Rows are fetched with runtime-checked queries and
/// aggregated in-process by the `analytics` crate.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
    analytics: AnalyticsEngine,
}

/// Represents a row from `decisions`, with the strategy name joined in.
#[derive(Debug, Clone, FromRow)]
struct DecisionRow {
    id: i64,
    created_at: DateTime<Utc>,
    environment: String,
    account_id: i64,
    strategy_id: Option<i64>,
    strategy_name: Option<String>,
    trigger_type: Option<String>,
    realized_pnl: Option<Decimal>,
    fee: Option<Decimal>,
    operation: Option<String>,
    symbol: Option<String>,
}

/// A trade joined with the decision that produced it.
#[derive(Debug, Clone, FromRow)]
struct TradeRecordRow {
    trade_id: i64,
    trade_symbol: String,
    pnl: Decimal,
    trade_fee: Decimal,
    executed_at: DateTime<Utc>,
    #[sqlx(flatten)]
    decision: DecisionRow,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = DbError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        let environment: Environment = row
            .environment
            .parse()
            .map_err(|e| DbError::InvalidRow(format!("decision {}: {}", row.id, e)))?;

        let strategy = row.strategy_id.map(|id| StrategyRef {
            id,
            name: row.strategy_name.unwrap_or_else(|| format!("strategy-{id}")),
        });

        Ok(Decision {
            id: row.id,
            timestamp: row.created_at,
            environment,
            account_id: row.account_id,
            strategy,
            trigger_type: row.trigger_type,
            realized_pnl: row.realized_pnl,
            fee: row.fee,
            operation: row.operation,
            symbol: row.symbol,
        })
    }
}

impl TryFrom<TradeRecordRow> for TradeRecord {
    type Error = DbError;

    fn try_from(row: TradeRecordRow) -> Result<Self, Self::Error> {
        let decision = Decision::try_from(row.decision)?;
        let trade = Trade {
            id: row.trade_id,
            decision_id: Some(decision.id),
            symbol: row.trade_symbol,
            pnl: row.pnl,
            fee: row.trade_fee,
            timestamp: row.executed_at,
        };
        Ok(TradeRecord::join(&trade, &decision))
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            analytics: AnalyticsEngine::new(),
        }
    }

    /// Fetches every decision matching the filter.
    async fn fetch_decisions<'e, E>(executor: E, filter: &Filter) -> Result<Vec<Decision>, DbError>
    where
        E: PgExecutor<'e>,
    {
        let (from, until) = filter.instant_bounds();
        let rows = sqlx::query_as::<_, DecisionRow>(SELECT_DECISIONS)
            .bind(filter.environment().as_str())
            .bind(filter.account_id())
            .bind(from)
            .bind(until)
            .fetch_all(executor)
            .await?;

        rows.into_iter().map(Decision::try_from).collect()
    }

    /// Fetches every trade linked to a decision matching the filter, already joined.
    async fn fetch_trade_records<'e, E>(
        executor: E,
        filter: &Filter,
    ) -> Result<Vec<TradeRecord>, DbError>
    where
        E: PgExecutor<'e>,
    {
        let (from, until) = filter.instant_bounds();
        let rows = sqlx::query_as::<_, TradeRecordRow>(SELECT_TRADE_RECORDS)
            .bind(filter.environment().as_str())
            .bind(filter.account_id())
            .bind(from)
            .bind(until)
            .fetch_all(executor)
            .await?;

        rows.into_iter().map(TradeRecord::try_from).collect()
    }
}

#[async_trait]
impl LedgerQueryPort for DbRepository {
    async fn get_summary(&self, filter: &Filter) -> Result<AttributionSummary, DbError> {
        // Decisions and trades are read from one snapshot so completeness and metrics agree.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let decisions = Self::fetch_decisions(&mut *tx, filter).await?;
        let records = Self::fetch_trade_records(&mut *tx, filter).await?;
        tx.commit().await?;

        Ok(self.analytics.summary(filter, &decisions, &records))
    }

    async fn get_by_dimension(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<DimensionResult, DbError> {
        let records = Self::fetch_trade_records(&self.pool, filter).await?;
        Ok(self.analytics.breakdown(dimension, &records))
    }

    async fn get_sync_status(&self, environment: Environment) -> Result<SyncStatus, DbError> {
        let unsynced: i64 = sqlx::query_scalar(COUNT_UNSYNCED)
            .bind(environment.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(SyncStatus::from_count(u64::try_from(unsynced).unwrap_or_default()))
    }

    async fn trigger_resync(&self, environment: Environment) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        // Serializes resyncs of one environment across every process sharing this ledger.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("pnl-resync:{environment}"))
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(RESYNC_PNL)
            .bind(environment.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %environment,
            updated = result.rows_affected(),
            "Recomputed cached PnL linkage from the trade ledger"
        );
        Ok(())
    }
}
