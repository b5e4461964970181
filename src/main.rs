use anyhow::{Context, Result};
use clap::Parser;
use movie_cache_proxy::config::Settings;
use movie_cache_proxy::infrastructure::{init_tracing, log_messages};
use movie_cache_proxy::proxy::types::ApiKey;
use movie_cache_proxy::Application;
use tracing::info;

/// Caching reverse proxy for the TMDB API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TMDB API key. Without it only cached content is served.
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new().context("failed to load configuration")?;

    init_tracing(&settings.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "{}", log_messages::application::STARTING);

    // An empty key means cache-only, like no key at all
    let api_key = cli.api_key.and_then(|key| ApiKey::try_new(key).ok());

    let app = Application::new(settings, api_key).await?;
    app.run().await?;

    Ok(())
}
