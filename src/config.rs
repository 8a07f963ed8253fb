//! Application configuration

use crate::link::DEFAULT_PATH_TEMPLATE;
use crate::proxy::checker::{CheckerConfig, DEFAULT_CHECK_URL};
use crate::proxy::fetcher::{FetcherConfig, DEFAULT_PROXY_LIST_URL};
use crate::proxy::sampler::{Sampler, DEFAULT_PROXY_COUNT, MAX_PROXY_COUNT};
use std::net::SocketAddr;
use std::time::Duration;

/// Identity used for every generated node unless overridden
pub const DEFAULT_IDENTITY: &str = "fccdaaae-af39-41a7-9fde-fd32a48278cf";

/// Application configuration, read-only once the process has started
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote proxy-list source
    pub proxy_list_url: String,
    /// Base URL of the liveness-check service
    pub check_api_url: String,
    /// Domains offered as the main domain in the interactive builder
    pub server_domains: Vec<String>,
    /// VMess/VLESS uuid, Trojan/Shadowsocks password
    pub identity: String,
    pub default_proxy_count: usize,
    pub max_proxies: usize,
    pub path_template: String,
    pub ui_title: String,
    /// Host that unmatched HTTP requests are forwarded to
    pub reverse_proxy_target: String,
    pub listen_addr: SocketAddr,
    pub fetch_timeout: Duration,
    pub check_timeout: Duration,
    pub check_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_list_url: DEFAULT_PROXY_LIST_URL.to_string(),
            check_api_url: DEFAULT_CHECK_URL.to_string(),
            server_domains: vec![
                "sirtu.oranglemah.my.id".to_string(),
                "dia.oranglemah.web.id".to_string(),
            ],
            identity: DEFAULT_IDENTITY.to_string(),
            default_proxy_count: DEFAULT_PROXY_COUNT,
            max_proxies: MAX_PROXY_COUNT,
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            ui_title: "AFRCloud Sub Generator".to_string(),
            reverse_proxy_target: "example.com".to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            fetch_timeout: Duration::from_secs(30),
            check_timeout: Duration::from_secs(10),
            check_concurrency: 10,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy_list_url(mut self, url: String) -> Self {
        self.proxy_list_url = url;
        self
    }

    pub fn with_check_api_url(mut self, url: String) -> Self {
        self.check_api_url = url;
        self
    }

    /// Replace the server domains; an empty list keeps the current ones
    pub fn with_server_domains(mut self, domains: Vec<String>) -> Self {
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if !domains.is_empty() {
            self.server_domains = domains;
        }
        self
    }

    pub fn with_identity(mut self, identity: String) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_reverse_proxy_target(mut self, target: String) -> Self {
        self.reverse_proxy_target = target;
        self
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_check_concurrency(mut self, concurrency: usize) -> Self {
        self.check_concurrency = concurrency.max(1);
        self
    }

    /// First server domain, used when nothing else names one
    pub fn primary_domain(&self) -> &str {
        self.server_domains
            .first()
            .map(String::as_str)
            .unwrap_or("localhost")
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::new(self.default_proxy_count, self.max_proxies)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::new().with_timeout(self.fetch_timeout)
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::new()
            .with_timeout(self.check_timeout)
            .with_concurrency(self.check_concurrency)
            .with_api_url(self.check_api_url.clone())
    }
}
