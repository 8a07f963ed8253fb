//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Country used when a list line has no third column
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Provider used when a list line has no fourth column
pub const UNKNOWN_PROVIDER: &str = "Unknown Provider";

/// One candidate endpoint from a proxy list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub ip: String,
    pub port: String,
    pub country: String,
    pub provider: String,
}

impl ProxyRecord {
    /// Create a record with every column present
    pub fn new(ip: &str, port: &str, country: &str, provider: &str) -> Self {
        Self {
            ip: ip.to_string(),
            port: port.to_string(),
            country: country.to_string(),
            provider: provider.to_string(),
        }
    }

    /// The record shown when no list could be loaded at all
    pub fn builtin() -> Self {
        Self::new("103.6.207.108", "8080", "ID", "PT Pusat Media Indonesia")
    }

    /// Get the record in IP:PORT format
    pub fn key(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// "{country} - {provider}", the base of every generated node name
    pub fn label(&self) -> String {
        format!("{} - {}", self.country, self.provider)
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}:{} | {}", self.country, self.ip, self.port, self.provider)
    }
}

/// Liveness of a record as reported by the external check service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LivenessStatus {
    /// Check not finished yet
    #[default]
    Checking,
    /// `proxyip: true`, with the round trip of the check itself
    Active { latency_ms: u64 },
    /// The service answered and did not report `proxyip: true`
    Dead,
    /// Network failure, timeout or an unreadable answer
    Unknown,
}

impl LivenessStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, LivenessStatus::Active { .. })
    }
}

impl fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessStatus::Checking => write!(f, "checking"),
            LivenessStatus::Active { latency_ms } => write!(f, "active ({}ms)", latency_ms),
            LivenessStatus::Dead => write!(f, "dead"),
            LivenessStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of checking a single record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResult {
    pub record: ProxyRecord,
    pub status: LivenessStatus,
}

impl LivenessResult {
    pub fn new(record: ProxyRecord, status: LivenessStatus) -> Self {
        Self { record, status }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
