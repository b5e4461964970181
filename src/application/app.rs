use crate::config::Settings;
use crate::infrastructure::log_messages;
use crate::proxy::types::{ApiKey, CredentialMode};
use crate::proxy::{DiskCacheStore, HttpUpstreamClient, ProxyService};
use crate::Result;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    router: Router,
}

impl Application {
    /// Build the proxy. `api_key` decides the credential mode for the whole run.
    #[instrument(skip_all)]
    pub async fn new(settings: Settings, api_key: Option<ApiKey>) -> Result<Self> {
        let mode = CredentialMode::from_api_key(api_key);
        match mode {
            CredentialMode::Authenticated(_) => info!("{}", log_messages::credentials::AUTHENTICATED),
            CredentialMode::CacheOnly => warn!("{}", log_messages::credentials::CACHE_ONLY),
        }

        let config = settings.proxy_config(mode)?;

        let store = DiskCacheStore::new(&settings.cache.directory).await;
        info!(
            path = %store.cache_dir().display(),
            ttl_secs = config.cache_ttl().as_secs(),
            "{}",
            log_messages::cache::USING_DIRECTORY
        );

        let upstream = HttpUpstreamClient::new(&config)?;
        let router = ProxyService::new(config, Arc::new(store), Arc::new(upstream)).into_router();

        Ok(Self { settings, router })
    }

    /// Bind the configured address and serve until Ctrl-C
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.settings.bind_address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        info!(
            address = %listener.local_addr()?,
            environment = %self.settings.application.environment,
            "{}",
            log_messages::application::LISTENING
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("{}", log_messages::application::STOPPED);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
    info!("{}", log_messages::application::SHUTDOWN_SIGNAL);
}
