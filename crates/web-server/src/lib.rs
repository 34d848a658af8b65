use axum::{
    routing::{get, post},
    Router,
};
use configuration::Config;
use database::{DbRepository, LedgerQueryPort};
use engine::AttributionService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AttributionService>,
}

/// Builds the `/api` router over an attribution service.
pub fn router(service: Arc<AttributionService>) -> Router {
    let app_state = Arc::new(AppState { service });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/analytics/summary", get(handlers::get_summary))
        .route("/api/analytics/by-symbol", get(handlers::get_by_symbol))
        .route("/api/analytics/by-strategy", get(handlers::get_by_strategy))
        .route("/api/analytics/by-trigger-type", get(handlers::get_by_trigger_type))
        .route("/api/analytics/by-operation", get(handlers::get_by_operation))
        .route("/api/analytics/attribution", get(handlers::get_attribution))
        .route("/api/analytics/pnl-sync-status", get(handlers::get_pnl_sync_status))
        .route("/api/analytics/pnl-sync", post(handlers::post_pnl_sync))
        .with_state(app_state)
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
}

/// Serves the API on `addr` until the process is stopped.
pub async fn run_server(addr: SocketAddr, service: Arc<AttributionService>) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server started and listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects to the PostgreSQL ledger described by `config` and serves the API on the
/// configured host and port.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let pool = database::connect(&config.database).await?;
    if config.database.run_migrations {
        database::run_migrations(&pool).await?;
    }
    let ledger: Arc<dyn LedgerQueryPort> = Arc::new(DbRepository::new(pool));
    let service = Arc::new(AttributionService::new(ledger, config.attribution.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    run_server(addr, service).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use configuration::AttributionConfig;
    use core_types::{Decision, Environment, StrategyRef, Trade};
    use database::{InMemoryLedger, LedgerSnapshot};
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let decision = Decision {
            id: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap(),
            environment: Environment::Testnet,
            account_id: 3,
            strategy: Some(StrategyRef { id: 5, name: "grid".to_string() }),
            trigger_type: Some("signal".to_string()),
            realized_pnl: None,
            fee: None,
            operation: Some("open".to_string()),
            symbol: Some("ETH".to_string()),
        };
        let trade = Trade {
            id: 1,
            decision_id: Some(1),
            symbol: "ETH".to_string(),
            pnl: dec!(12),
            fee: dec!(0.5),
            timestamp: Utc.with_ymd_and_hms(2024, 4, 2, 8, 1, 0).unwrap(),
        };
        let ledger = InMemoryLedger::new(LedgerSnapshot {
            decisions: vec![decision],
            trades: vec![trade],
        });
        let service = AttributionService::new(Arc::new(ledger), AttributionConfig::default());
        router(Arc::new(service))
    }

    async fn call(method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let (status, body) =
            call("GET", "/api/analytics/summary?environment=testnet&account_id=3&period=all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overview"]["trade_count"], 1);
        assert_eq!(body["data_completeness"]["total_decisions"], 1);
    }

    #[tokio::test]
    async fn test_by_strategy_flattens_the_key() {
        let (status, body) = call(
            "GET",
            "/api/analytics/by-strategy?environment=testnet&start_date=2024-04-01&end_date=2024-04-30",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["strategy_id"], 5);
        assert_eq!(body["items"][0]["strategy_name"], "grid");
        assert!(body["items"][0]["by_trigger_type"]["signal"].is_object());
    }

    #[tokio::test]
    async fn test_attribution_batch_endpoint() {
        let (status, body) = call("GET", "/api/analytics/attribution?environment=testnet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["by_symbol"]["items"][0]["symbol"], "ETH");
        assert_eq!(body["by_operation"]["items"][0]["operation"], "open");
        assert!(body.get("mismatches").is_none());
    }

    #[tokio::test]
    async fn test_bad_filters_are_rejected() {
        let (status, body) = call("GET", "/api/analytics/summary?environment=papernet").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("environment"));

        let (status, _) =
            call("GET", "/api/analytics/by-symbol?environment=testnet&start_date=2024-04-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            call("GET", "/api/analytics/summary?environment=testnet&account_id=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pnl_sync_endpoints() {
        let (status, body) = call("GET", "/api/analytics/pnl-sync-status?environment=testnet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["needs_sync"], true);
        assert_eq!(body["unsynced_count"], 1);

        let (status, body) = call("POST", "/api/analytics/pnl-sync?environment=testnet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["needs_sync"], false);
    }
}
