//! Sub Forge - Proxy Subscription Generator
//!
//! Turns a remote list of proxy endpoints into share links (vmess, vless,
//! trojan, shadowsocks) and subscription documents (plain links, Clash YAML,
//! sing-box JSON). It can serve them over HTTP or build single links
//! interactively in the terminal.

pub mod config;
pub mod link;
pub mod proxy;
pub mod render;
pub mod server;
pub mod tui;

pub use config::Config;
pub use link::{GenerationRequest, HostPolicy, Protocol, ProtocolSelection};
pub use proxy::*;
pub use render::SubscriptionFormat;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
