//! Remote proxy-list fetching
//!
//! This module provides functionality for:
//! - Fetching the proxy list text with a single direct request
//! - Retrying through an ordered chain of relay strategies
//! - Falling back to the built-in record when every strategy fails

use crate::proxy::models::ProxyRecord;
use crate::proxy::parser::ProxyParser;
use crate::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = concat!("sub-forge/", env!("CARGO_PKG_VERSION"));

/// Default proxy-list source
pub const DEFAULT_PROXY_LIST_URL: &str =
    "https://raw.githubusercontent.com/AFRcloud/ProxyList/refs/heads/main/ProxyList.txt";

/// Why a single fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{strategy} returned HTTP {status}")]
    Status { strategy: FetchStrategy, status: u16 },
    #[error("{strategy} request failed: {source}")]
    Network {
        strategy: FetchStrategy,
        #[source]
        source: reqwest::Error,
    },
    #[error("{strategy} body could not be read: {source}")]
    Body {
        strategy: FetchStrategy,
        #[source]
        source: reqwest::Error,
    },
    #[error("{strategy} answer carried no contents")]
    MissingContents { strategy: FetchStrategy },
}

/// One way of reaching the list source, tried in the order of [`FetchStrategy::CHAIN`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Direct,
    CorsAnywhere,
    AllOrigins,
    CorsSh,
}

impl FetchStrategy {
    /// Order in which strategies are tried
    pub const CHAIN: [FetchStrategy; 4] = [
        FetchStrategy::Direct,
        FetchStrategy::CorsAnywhere,
        FetchStrategy::AllOrigins,
        FetchStrategy::CorsSh,
    ];

    /// URL requested for a given source
    pub fn request_url(&self, relays: &RelayHosts, url: &str) -> String {
        match self {
            FetchStrategy::Direct => url.to_string(),
            FetchStrategy::CorsAnywhere => format!("{}/{}", relays.cors_anywhere, url),
            FetchStrategy::AllOrigins => format!(
                "{}/get?url={}",
                relays.allorigins,
                urlencoding::encode(url)
            ),
            FetchStrategy::CorsSh => format!("{}/{}", relays.cors_sh, url),
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Direct => write!(f, "direct"),
            FetchStrategy::CorsAnywhere => write!(f, "cors-anywhere"),
            FetchStrategy::AllOrigins => write!(f, "allorigins"),
            FetchStrategy::CorsSh => write!(f, "cors.sh"),
        }
    }
}

/// Base URLs of the relay services, without a trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHosts {
    pub cors_anywhere: String,
    pub allorigins: String,
    pub cors_sh: String,
}

impl Default for RelayHosts {
    fn default() -> Self {
        Self {
            cors_anywhere: "https://cors-anywhere.herokuapp.com".to_string(),
            allorigins: "https://api.allorigins.win".to_string(),
            cors_sh: "https://cors.sh".to_string(),
        }
    }
}

/// JSON envelope returned by allorigins
#[derive(Debug, Deserialize)]
struct AllOriginsEnvelope {
    contents: Option<String>,
}

/// Where a loaded list came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOrigin {
    Remote(FetchStrategy),
    Builtin,
}

/// Records loaded for display, with their origin
#[derive(Debug, Clone)]
pub struct LoadedList {
    pub records: Vec<ProxyRecord>,
    pub origin: ListOrigin,
}

/// Configuration for the list fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Relays tried after the direct request
    pub relays: RelayHosts,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            relays: RelayHosts::default(),
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_relays(mut self, relays: RelayHosts) -> Self {
        self.relays = relays;
        self
    }
}

/// Fetches proxy-list text
#[derive(Clone)]
pub struct ListFetcher {
    client: Client,
    relays: RelayHosts,
}

impl ListFetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a new fetcher with custom configuration
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            relays: config.relays,
        })
    }

    /// Fetch the list with a single direct request
    pub async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.fetch_with(FetchStrategy::Direct, url).await
    }

    /// Fetch through one strategy
    pub async fn fetch_with(
        &self,
        strategy: FetchStrategy,
        url: &str,
    ) -> std::result::Result<String, FetchError> {
        let mut request = self.client.get(strategy.request_url(&self.relays, url));
        if strategy == FetchStrategy::CorsSh {
            request = request.header("x-cors-api-key", temporary_api_key());
        }

        let response = request
            .send()
            .await
            .map_err(|source| FetchError::Network { strategy, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                strategy,
                status: status.as_u16(),
            });
        }

        if strategy == FetchStrategy::AllOrigins {
            let envelope: AllOriginsEnvelope = response
                .json()
                .await
                .map_err(|source| FetchError::Body { strategy, source })?;
            return envelope
                .contents
                .ok_or(FetchError::MissingContents { strategy });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Body { strategy, source })
    }

    /// Try every strategy in order, stopping at the first success
    pub async fn fetch_with_fallback(
        &self,
        url: &str,
    ) -> std::result::Result<(FetchStrategy, String), Vec<FetchError>> {
        let mut failures = Vec::new();

        for strategy in FetchStrategy::CHAIN {
            match self.fetch_with(strategy, url).await {
                Ok(text) => {
                    debug!("Fetched {} bytes via {}", text.len(), strategy);
                    return Ok((strategy, text));
                }
                Err(e) => {
                    warn!("Strategy {} failed: {}", strategy, e);
                    failures.push(e);
                }
            }
        }

        Err(failures)
    }

    /// Load records for interactive display.
    ///
    /// Never fails: when every strategy fails, or the fetched text holds no
    /// records, the built-in record is returned instead.
    pub async fn load_or_builtin(&self, url: &str) -> LoadedList {
        match self.fetch_with_fallback(url).await {
            Ok((strategy, text)) => {
                let records = ProxyParser::parse(&text);
                if records.is_empty() {
                    warn!("List from {} has no records, using built-in record", url);
                    return LoadedList::builtin();
                }
                info!("Loaded {} records via {}", records.len(), strategy);
                LoadedList {
                    records,
                    origin: ListOrigin::Remote(strategy),
                }
            }
            Err(failures) => {
                warn!(
                    "All {} strategies failed for {}, using built-in record",
                    failures.len(),
                    url
                );
                LoadedList::builtin()
            }
        }
    }
}

impl LoadedList {
    pub fn builtin() -> Self {
        Self {
            records: vec![ProxyRecord::builtin()],
            origin: ListOrigin::Builtin,
        }
    }
}

fn temporary_api_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("temp_{}", suffix.to_lowercase())
}
