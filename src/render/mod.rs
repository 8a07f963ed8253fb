//! Subscription document renderers
//!
//! This module provides functionality for:
//! - Mapping a `/sub/{format}` path segment to an output format
//! - Rendering plain link lists, Clash YAML and sing-box/Nekobox JSON

pub mod clash;
pub mod plain;
pub mod singbox;

use crate::link::GenerationRequest;
use crate::proxy::models::ProxyRecord;
use crate::Result;
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::str::FromStr;

/// Offset used for the Clash header date (Asia/Jakarta)
const HEADER_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Output formats a subscription can be rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFormat {
    /// Newline-separated URIs
    Plain,
    /// Clash proxy-provider YAML
    Clash,
    /// sing-box configuration as imported by Nekobox
    Nekobox,
}

impl SubscriptionFormat {
    /// Resolve a `/sub/{format}` segment.
    ///
    /// `singbox`, `surfboard` and `husi` have no dedicated renderer and are
    /// served as plain links. Unknown names yield `None`.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment.to_lowercase().as_str() {
            "clash" => Some(SubscriptionFormat::Clash),
            "nekobox" => Some(SubscriptionFormat::Nekobox),
            "v2ray" | "v2rayng" | "singbox" | "surfboard" | "husi" => {
                Some(SubscriptionFormat::Plain)
            }
            _ => None,
        }
    }

    /// Every path segment the HTTP service accepts
    pub fn path_names() -> &'static [&'static str] {
        &[
            "clash", "v2ray", "v2rayng", "nekobox", "singbox", "surfboard", "husi",
        ]
    }
}

impl fmt::Display for SubscriptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionFormat::Plain => write!(f, "v2ray"),
            SubscriptionFormat::Clash => write!(f, "clash"),
            SubscriptionFormat::Nekobox => write!(f, "nekobox"),
        }
    }
}

impl FromStr for SubscriptionFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_path(s.trim()).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid format: {}. Use: {}",
                s,
                Self::path_names().join(", ")
            )
        })
    }
}

/// Current time in the offset shown in generated headers
pub fn header_now() -> DateTime<FixedOffset> {
    let now = Utc::now().fixed_offset();
    match FixedOffset::east_opt(HEADER_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset),
        None => now,
    }
}

/// Render a document for already selected records
pub fn render(
    format: SubscriptionFormat,
    request: &GenerationRequest,
    records: &[ProxyRecord],
    generated_at: DateTime<FixedOffset>,
) -> Result<String> {
    match format {
        SubscriptionFormat::Plain => Ok(plain::render(request, records)),
        SubscriptionFormat::Clash => clash::render(request, records, generated_at),
        SubscriptionFormat::Nekobox => singbox::render(request, records),
    }
}
