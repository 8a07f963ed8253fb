//! Liveness checker backed by an external proxy-check service

use crate::proxy::models::{LivenessResult, LivenessStatus, ProxyRecord};
use crate::Result;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default timeout for a single check in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 10;

/// Default check service; queried as `{base}/{ip}:{port}`
pub const DEFAULT_CHECK_URL: &str = "https://api.jb8fd7grgd.workers.dev/";

/// Configuration for the liveness checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each check
    pub timeout: Duration,
    /// Number of concurrent checks
    pub concurrency: usize,
    /// Base URL of the check service
    pub api_url: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            api_url: DEFAULT_CHECK_URL.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }
}

/// Checks records against the external service
#[derive(Clone)]
pub struct LivenessChecker {
    config: CheckerConfig,
    client: Client,
}

impl LivenessChecker {
    /// Create a new checker with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// URL queried for a record
    pub fn status_url(&self, record: &ProxyRecord) -> String {
        format!(
            "{}/{}:{}",
            self.config.api_url.trim_end_matches('/'),
            record.ip,
            record.port
        )
    }

    /// Check a single record. Never fails: errors map to `Unknown`.
    pub async fn check(&self, record: &ProxyRecord) -> LivenessStatus {
        let url = self.status_url(record);
        let start = Instant::now();

        let response = tokio::time::timeout(self.config.timeout, async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.json::<Value>().await
        })
        .await;

        match response {
            Ok(Ok(body)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                classify(&body, latency_ms)
            }
            Ok(Err(e)) => {
                debug!("Check for {} failed: {}", record.key(), e);
                LivenessStatus::Unknown
            }
            Err(_) => {
                debug!("Check for {} timed out", record.key());
                LivenessStatus::Unknown
            }
        }
    }

    /// Check many records concurrently; results come back in completion order
    pub async fn check_all(&self, records: Vec<ProxyRecord>) -> Vec<LivenessResult> {
        stream::iter(records)
            .map(|record| {
                let checker = self.clone();
                async move {
                    let status = checker.check(&record).await;
                    LivenessResult::new(record, status)
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    /// Spawn one independent check per record, each reporting on the channel.
    ///
    /// A check that fails only produces an `Unknown` for its own record; a
    /// closed receiver simply drops late results.
    pub fn spawn_checks(&self, records: Vec<ProxyRecord>, tx: mpsc::UnboundedSender<LivenessResult>) {
        for record in records {
            let checker = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let status = checker.check(&record).await;
                if tx.send(LivenessResult::new(record, status)).is_err() {
                    warn!("Liveness result dropped, receiver is gone");
                }
            });
        }
    }
}

/// Interpret a check-service answer: an object or an array whose first
/// element carries a boolean `proxyip`.
pub fn classify(body: &Value, latency_ms: u64) -> LivenessStatus {
    let entry = match body {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    match entry.and_then(|e| e.get("proxyip")).and_then(Value::as_bool) {
        Some(true) => LivenessStatus::Active { latency_ms },
        _ => LivenessStatus::Dead,
    }
}
