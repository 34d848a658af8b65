use clap::{Parser, Subcommand};
use configuration::Config;
use core_types::{Environment, FilterSelection, Period};
use database::{DbRepository, InMemoryLedger, LedgerQueryPort};
use engine::AttributionService;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod render;
mod telemetry;

/// The entry point for the attribution engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load `.env` first so `ATTRIBUTION__*` overrides in it reach the config loader.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config_from(&cli.config)?;
    let _log_guard = telemetry::init(&config.logging)?;

    match cli.command {
        Commands::Serve(args) => handle_serve(args, config).await,
        Commands::Report(args) => handle_report(args, config).await,
        Commands::Sync(args) => handle_sync(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Attributes realized trading performance across symbols, strategies, trigger types
/// and operations.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the attribution HTTP API.
    Serve(ServeArgs),
    /// Print the attribution report for one filter.
    Report(ReportArgs),
    /// Check the cached PnL linkage and repair it if it drifted.
    Sync(SyncArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Address to bind, overriding `server.host` and `server.port`.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Serve a JSON ledger export instead of the database.
    #[arg(long)]
    ledger_file: Option<PathBuf>,
}

#[derive(Parser)]
struct ReportArgs {
    /// testnet or mainnet. Defaults to `attribution.default_environment`.
    #[arg(long)]
    environment: Option<Environment>,

    /// Restrict to one account.
    #[arg(long)]
    account: Option<i64>,

    /// today, week, month or all. Defaults to `attribution.default_period`.
    #[arg(long)]
    period: Option<Period>,

    /// Read a JSON ledger export instead of the database.
    #[arg(long)]
    ledger_file: Option<PathBuf>,

    /// Fail when a breakdown does not reconcile with the summary.
    #[arg(long)]
    strict: bool,

    /// Print the report as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct SyncArgs {
    /// testnet or mainnet. Defaults to `attribution.default_environment`.
    #[arg(long)]
    environment: Option<Environment>,

    /// Repair a JSON ledger export in place instead of the database.
    #[arg(long)]
    ledger_file: Option<PathBuf>,
}

// ==============================================================================
// Ledger Wiring
// ==============================================================================

async fn connect_database(config: &Config) -> anyhow::Result<Arc<dyn LedgerQueryPort>> {
    let pool = database::connect(&config.database).await?;
    if config.database.run_migrations {
        database::run_migrations(&pool).await?;
    }
    Ok(Arc::new(DbRepository::new(pool)))
}

async fn open_ledger(
    config: &Config,
    ledger_file: Option<&Path>,
) -> anyhow::Result<Arc<dyn LedgerQueryPort>> {
    match ledger_file {
        Some(path) => Ok(Arc::new(InMemoryLedger::from_json_file(path).await?)),
        None => connect_database(config).await,
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_serve(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    let addr = match args.addr {
        Some(addr) => addr,
        None => format!("{}:{}", config.server.host, config.server.port).parse()?,
    };
    let ledger = open_ledger(&config, args.ledger_file.as_deref()).await?;
    let service = Arc::new(AttributionService::new(ledger, config.attribution.clone()));
    web_server::run_server(addr, service).await
}

async fn handle_report(args: ReportArgs, config: Config) -> anyhow::Result<()> {
    let ledger = open_ledger(&config, args.ledger_file.as_deref()).await?;
    let service = AttributionService::new(ledger, config.attribution.clone());

    let defaults = service.default_selection(args.environment);
    let selection = FilterSelection {
        account_id: args.account,
        period: args.period.unwrap_or(defaults.period),
        ..defaults
    };

    let mut report = service.load_selection(selection).await?;
    if args.strict {
        report = report.ensure_consistent()?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::print_report(&report);
    }
    Ok(())
}

async fn handle_sync(args: SyncArgs, config: Config) -> anyhow::Result<()> {
    let environment = args
        .environment
        .unwrap_or(config.attribution.default_environment);

    // Kept concrete so the repaired snapshot can be written back afterwards.
    let file_ledger = match &args.ledger_file {
        Some(path) => Some(Arc::new(InMemoryLedger::from_json_file(path).await?)),
        None => None,
    };
    let ledger: Arc<dyn LedgerQueryPort> = match &file_ledger {
        Some(ledger) => Arc::clone(ledger) as Arc<dyn LedgerQueryPort>,
        None => connect_database(&config).await?,
    };
    let service = AttributionService::new(ledger, config.attribution.clone());

    let spinner = render::sync_spinner(environment);
    let result = service.check_and_repair_sync(environment).await;
    spinner.finish_and_clear();
    let status = result?;

    if let (Some(ledger), Some(path)) = (&file_ledger, &args.ledger_file) {
        ledger.save_json_file(path).await?;
        tracing::info!(path = %path.display(), "Wrote repaired ledger snapshot");
    }

    render::print_sync_status(environment, &status);
    Ok(())
}
