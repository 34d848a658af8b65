// This main function is the entry point when running `cargo run -p web-server`.
// It serves the API against the PostgreSQL ledger named in `config.toml`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = configuration::load_config()?;
    web_server::run(config).await
}
