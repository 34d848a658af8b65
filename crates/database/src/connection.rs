use crate::error::DbError;
use configuration::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL ledger.
///
/// The URL comes from `database.url` in the configuration, or from `DATABASE_URL`
/// (loaded from `.env` when present). The pool's acquire timeout is the only timeout
/// applied to ledger queries.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let database_url = match &config.url {
        Some(url) => url.clone(),
        None => {
            dotenvy::dotenv().ok();
            env::var("DATABASE_URL").map_err(|_e| {
                DbError::ConnectionConfigError("DATABASE_URL must be set.".to_string())
            })?
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&database_url)
        .await?;

    tracing::info!(max_connections = config.max_connections, "Connected to ledger database");
    Ok(pool)
}

/// Applies the ledger schema migrations shipped with this crate.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
