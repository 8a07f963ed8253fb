//! Link generation for proxy records
//!
//! This module provides functionality for:
//! - Describing a generation request (protocol, TLS, bug hosts, identity)
//! - Planning one encoded node per record, host and protocol
//! - Encoding nodes as vmess / vless / trojan / ss URIs

pub mod encoder;
pub mod node;

pub use encoder::{encode, encode_node, SsStyle};
pub use node::{plan_nodes, EncodedNode};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default path template; `{ip}` and `{port}` are substituted per record
pub const DEFAULT_PATH_TEMPLATE: &str = "/Free/{ip}-{port}";

/// Supported link protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    VMess,
    VLess,
    Trojan,
    Shadowsocks,
}

impl Protocol {
    /// Fan-out order used for `mix`
    pub const ALL: [Protocol; 4] = [
        Protocol::VMess,
        Protocol::VLess,
        Protocol::Trojan,
        Protocol::Shadowsocks,
    ];

    /// Label used in node names
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::VMess => "VMess",
            Protocol::VLess => "VLESS",
            Protocol::Trojan => "Trojan",
            Protocol::Shadowsocks => "SS",
        }
    }

    /// Name used in query strings and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::VMess => "vmess",
            Protocol::VLess => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vmess" => Ok(Protocol::VMess),
            "vless" => Ok(Protocol::VLess),
            "trojan" => Ok(Protocol::Trojan),
            "shadowsocks" | "ss" => Ok(Protocol::Shadowsocks),
            other => Err(anyhow!(
                "Invalid protocol: {}. Use: vmess, vless, trojan, shadowsocks",
                other
            )),
        }
    }
}

/// One protocol, or all four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolSelection {
    Single(Protocol),
    #[default]
    Mix,
}

impl ProtocolSelection {
    /// Protocols to emit per host, in emission order
    pub fn protocols(&self) -> Vec<Protocol> {
        match self {
            ProtocolSelection::Single(p) => vec![*p],
            ProtocolSelection::Mix => Protocol::ALL.to_vec(),
        }
    }
}

impl fmt::Display for ProtocolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolSelection::Single(p) => write!(f, "{}", p),
            ProtocolSelection::Mix => write!(f, "mix"),
        }
    }
}

impl FromStr for ProtocolSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("mix") {
            return Ok(ProtocolSelection::Mix);
        }
        s.parse().map(ProtocolSelection::Single)
    }
}

/// How bug hosts combine with the main domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BugMode {
    /// Bug hosts are ignored
    #[default]
    None,
    /// The bug host is used as is
    Plain,
    /// The bug host becomes a subdomain: `{bug}.{main_domain}`
    Wildcard,
}

/// Which address goes where in a generated node.
///
/// The interactive builder and the subscription endpoint disagree on this,
/// so both are kept and each caller names the one it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPolicy {
    /// Connect to the main domain; the bug only shows up in the Host header
    /// and, under TLS, the SNI.
    Fronted,
    /// Connect to the bug host itself; server, Host header and SNI are all
    /// the same value.
    Direct,
}

/// Everything that determines the output for a given record set
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub protocol: ProtocolSelection,
    pub tls: bool,
    pub bug_hosts: Vec<String>,
    pub bug_mode: BugMode,
    pub main_domain: String,
    /// Raw country filter, normalized later
    pub country: String,
    /// Requested record count, clamped later
    pub limit: Option<i64>,
    /// VMess/VLESS uuid, or Trojan/Shadowsocks password
    pub identity: String,
    pub path_template: String,
}

impl GenerationRequest {
    pub fn new(main_domain: &str, identity: &str) -> Self {
        Self {
            protocol: ProtocolSelection::Mix,
            tls: true,
            bug_hosts: Vec::new(),
            bug_mode: BugMode::None,
            main_domain: main_domain.to_string(),
            country: String::new(),
            limit: None,
            identity: identity.to_string(),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolSelection) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_bugs(mut self, bug_hosts: Vec<String>, bug_mode: BugMode) -> Self {
        self.bug_hosts = bug_hosts;
        self.bug_mode = bug_mode;
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = country.to_string();
        self
    }

    pub fn with_limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_path_template(mut self, template: &str) -> Self {
        self.path_template = template.to_string();
        self
    }

    /// Bug hosts that take part in generation; empty means "main domain only"
    pub fn active_bug_hosts(&self) -> Vec<&str> {
        if self.bug_mode == BugMode::None {
            return Vec::new();
        }
        self.bug_hosts
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect()
    }

    /// Bug host as it appears on the wire
    pub fn effective_host(&self, bug: &str) -> String {
        match self.bug_mode {
            BugMode::Wildcard => format!("{}.{}", bug, self.main_domain),
            BugMode::Plain | BugMode::None => bug.to_string(),
        }
    }

    pub fn port(&self) -> u16 {
        if self.tls {
            443
        } else {
            80
        }
    }

    pub fn security(&self) -> &'static str {
        if self.tls {
            "tls"
        } else {
            "none"
        }
    }
}

/// Split a comma-separated bug list
pub fn split_bug_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
