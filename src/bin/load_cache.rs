use anyhow::{Context, Result};
use clap::Parser;
use movie_cache_proxy::config::Settings;
use movie_cache_proxy::infrastructure::{init_tracing, log_messages};
use movie_cache_proxy::warmup::{CacheWarmer, DEFAULT_BASE_URL};
use tracing::error;

/// Fill a running proxy's cache by crawling popular movies
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Base URL of the running proxy
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new().context("failed to load configuration")?;
    init_tracing(&settings.logging);

    let warmer = CacheWarmer::new(cli.base_url);
    if let Err(e) = warmer.run().await {
        error!(error = %e, "{}", log_messages::warmup::FAILED);
        return Err(e).context("cache warm-up failed");
    }

    Ok(())
}
