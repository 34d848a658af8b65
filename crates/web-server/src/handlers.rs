use crate::{error::AppError, AppState};
use analytics::{AttributionSummary, DimensionResult};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use core_types::{Dimension, Environment, Filter, FilterSelection, SyncStatus};
use engine::AttributionReport;
use serde::Deserialize;
use std::sync::Arc;

/// The filter as the dashboard sends it. Explicit dates win over `period`; with neither,
/// the configured default period applies.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub environment: Option<String>,
    pub account_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub period: Option<String>,
}

impl FilterQuery {
    fn into_filter(self, state: &AppState) -> Result<Filter, AppError> {
        let environment = parse_environment(self.environment.as_deref(), state)?;

        if self.start_date.is_some() || self.end_date.is_some() {
            return Ok(Filter::from_bounds(
                environment,
                self.account_id,
                self.start_date,
                self.end_date,
            )?);
        }

        let period = match self.period.as_deref() {
            Some(raw) => raw.parse()?,
            None => state.service.settings().default_period,
        };
        let selection = FilterSelection {
            environment,
            account_id: self.account_id,
            period,
        };
        Ok(selection.resolve()?)
    }
}

#[derive(Debug, Deserialize)]
pub struct EnvironmentQuery {
    pub environment: Option<String>,
}

fn parse_environment(raw: Option<&str>, state: &AppState) -> Result<Environment, AppError> {
    match raw {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(state.service.settings().default_environment),
    }
}

/// # GET /api/analytics/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<AttributionSummary>, AppError> {
    let filter = query.into_filter(&state)?;
    let summary = state.service.summary(&filter).await?;
    Ok(Json(summary))
}

async fn by_dimension(
    state: &AppState,
    dimension: Dimension,
    query: FilterQuery,
) -> Result<Json<DimensionResult>, AppError> {
    let filter = query.into_filter(state)?;
    let result = state.service.by_dimension(dimension, &filter).await?;
    Ok(Json(result))
}

/// # GET /api/analytics/by-symbol
pub async fn get_by_symbol(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DimensionResult>, AppError> {
    by_dimension(&state, Dimension::Symbol, query).await
}

/// # GET /api/analytics/by-strategy
pub async fn get_by_strategy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DimensionResult>, AppError> {
    by_dimension(&state, Dimension::Strategy, query).await
}

/// # GET /api/analytics/by-trigger-type
pub async fn get_by_trigger_type(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DimensionResult>, AppError> {
    by_dimension(&state, Dimension::TriggerType, query).await
}

/// # GET /api/analytics/by-operation
pub async fn get_by_operation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DimensionResult>, AppError> {
    by_dimension(&state, Dimension::Operation, query).await
}

/// # GET /api/analytics/attribution
/// The summary and all four breakdowns, computed as one batch.
pub async fn get_attribution(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<AttributionReport>, AppError> {
    let filter = query.into_filter(&state)?;
    let report = state.service.load_attribution(filter).await?;
    Ok(Json(report))
}

/// # GET /api/analytics/pnl-sync-status
pub async fn get_pnl_sync_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<SyncStatus>, AppError> {
    let environment = parse_environment(query.environment.as_deref(), &state)?;
    let status = state.service.sync_status(environment).await?;
    Ok(Json(status))
}

/// # POST /api/analytics/pnl-sync
/// Checks, repairs when needed, and returns the status after the recheck.
pub async fn post_pnl_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<SyncStatus>, AppError> {
    let environment = parse_environment(query.environment.as_deref(), &state)?;
    tracing::info!(%environment, "PnL resync requested");
    let status = state.service.check_and_repair_sync(environment).await?;
    Ok(Json(status))
}
