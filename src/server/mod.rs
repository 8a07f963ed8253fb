//! HTTP subscription service
//!
//! Routes:
//! - `GET /sub/{format}` renders a subscription
//! - `GET /sub` serves the generator form
//! - `GET /web` serves the landing page
//! - everything else is forwarded to the reverse-proxy target

pub mod handlers;
pub mod pages;
pub mod reverse_proxy;

use crate::config::Config;
use crate::proxy::fetcher::ListFetcher;
use crate::Result;
use anyhow::Context;
use axum::routing::get;
use axum::Router;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: ListFetcher,
    /// Client used for reverse-proxied requests
    pub client: Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = ListFetcher::with_config(config.fetcher_config())?;
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .context("Failed to build reverse-proxy client")?;

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            client,
        })
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/sub",
            get(pages::generator_form).fallback(reverse_proxy::forward),
        )
        .route(
            "/sub/:format",
            get(handlers::subscription).fallback(reverse_proxy::forward),
        )
        .route("/web", get(pages::landing).fallback(reverse_proxy::forward))
        .fallback(reverse_proxy::forward)
        .with_state(state)
}

/// Bind the configured address and serve until the process stops
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.listen_addr;
    let state = AppState::new(config)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Subscription service listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server stopped unexpectedly")?;
    Ok(())
}
