//! Clash proxy-provider YAML

use crate::link::{plan_nodes, EncodedNode, GenerationRequest, HostPolicy, Protocol};
use crate::proxy::models::ProxyRecord;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Name written into the header comment
const GENERATOR: &str = "sub-forge";

#[derive(Debug, Serialize)]
struct ProviderFile {
    proxies: Vec<ClashProxy>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ClashProxy {
    VMess(VMessProxy),
    VLess(VLessProxy),
    Trojan(TrojanProxy),
    Shadowsocks(ShadowsocksProxy),
}

#[derive(Debug, Serialize)]
struct WsHeaders {
    #[serde(rename = "Host")]
    host: String,
}

#[derive(Debug, Serialize)]
struct WsOpts {
    path: String,
    headers: WsHeaders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct VMessProxy {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    server: String,
    port: u16,
    uuid: String,
    #[serde(rename = "alterId")]
    alter_id: u32,
    cipher: &'static str,
    udp: bool,
    tls: bool,
    skip_cert_verify: bool,
    servername: String,
    network: &'static str,
    ws_opts: WsOpts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct VLessProxy {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    server: String,
    port: u16,
    uuid: String,
    udp: bool,
    tls: bool,
    skip_cert_verify: bool,
    servername: String,
    network: &'static str,
    ws_opts: WsOpts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct TrojanProxy {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    server: String,
    port: u16,
    password: String,
    udp: bool,
    sni: String,
    skip_cert_verify: bool,
    network: &'static str,
    ws_opts: WsOpts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct PluginOpts {
    mode: &'static str,
    tls: bool,
    skip_cert_verify: bool,
    host: String,
    path: String,
    mux: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ShadowsocksProxy {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    server: String,
    port: u16,
    cipher: &'static str,
    password: String,
    udp: bool,
    plugin: &'static str,
    plugin_opts: PluginOpts,
}

fn ws_opts(node: &EncodedNode) -> WsOpts {
    WsOpts {
        path: node.path.clone(),
        headers: WsHeaders {
            host: node.host_header.clone(),
        },
    }
}

fn server_name(node: &EncodedNode) -> String {
    node.sni.clone().unwrap_or_else(|| node.host_header.clone())
}

fn to_proxy(node: &EncodedNode) -> ClashProxy {
    match node.protocol {
        Protocol::VMess => ClashProxy::VMess(VMessProxy {
            name: node.display_name.clone(),
            kind: "vmess",
            server: node.server.clone(),
            port: node.port,
            uuid: node.identity.clone(),
            alter_id: 0,
            cipher: "zero",
            udp: false,
            tls: node.tls,
            skip_cert_verify: true,
            servername: server_name(node),
            network: "ws",
            ws_opts: ws_opts(node),
        }),
        Protocol::VLess => ClashProxy::VLess(VLessProxy {
            name: node.display_name.clone(),
            kind: "vless",
            server: node.server.clone(),
            port: node.port,
            uuid: node.identity.clone(),
            udp: false,
            tls: node.tls,
            skip_cert_verify: true,
            servername: server_name(node),
            network: "ws",
            ws_opts: ws_opts(node),
        }),
        Protocol::Trojan => ClashProxy::Trojan(TrojanProxy {
            name: node.display_name.clone(),
            kind: "trojan",
            server: node.server.clone(),
            port: node.port,
            password: node.identity.clone(),
            udp: false,
            sni: server_name(node),
            skip_cert_verify: true,
            network: "ws",
            ws_opts: ws_opts(node),
        }),
        Protocol::Shadowsocks => ClashProxy::Shadowsocks(ShadowsocksProxy {
            name: node.display_name.clone(),
            kind: "ss",
            server: node.server.clone(),
            port: node.port,
            cipher: "none",
            password: node.identity.clone(),
            udp: false,
            plugin: "v2ray-plugin",
            plugin_opts: PluginOpts {
                mode: "websocket",
                tls: node.tls,
                skip_cert_verify: true,
                host: node.host_header.clone(),
                path: node.path.clone(),
                mux: false,
            },
        }),
    }
}

/// Comment block placed above the proxy list
pub fn header(request: &GenerationRequest, generated_at: DateTime<FixedOffset>) -> String {
    format!(
        "# Clash Proxy Provider Configuration\n\
         # Generated by {}\n\
         # Date: {}\n\
         # Protocol: {}\n\
         # TLS: {}\n\n",
        GENERATOR,
        generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p"),
        request.protocol.to_string().to_uppercase(),
        if request.tls { "Enabled" } else { "Disabled" }
    )
}

pub fn render(
    request: &GenerationRequest,
    records: &[ProxyRecord],
    generated_at: DateTime<FixedOffset>,
) -> Result<String> {
    let file = ProviderFile {
        proxies: plan_nodes(request, records, HostPolicy::Direct)
            .iter()
            .map(to_proxy)
            .collect(),
    };
    let body = serde_yaml::to_string(&file).context("Failed to serialize Clash proxies")?;

    Ok(format!("{}{}", header(request, generated_at), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{BugMode, ProtocolSelection};
    use chrono::TimeZone;
    use serde_yaml::Value;

    fn timestamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .unwrap()
    }

    fn records() -> Vec<ProxyRecord> {
        vec![ProxyRecord::new("1.1.1.1", "80", "ID", "ProviderA")]
    }

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_header() {
        let request = GenerationRequest::new("example.com", "id").with_tls(false);
        let header = header(&request, timestamp());
        assert!(header.contains("# Date: 3/5/2024, 2:07:09 PM\n"));
        assert!(header.contains("# Protocol: MIX\n"));
        assert!(header.contains("# TLS: Disabled\n"));
        assert!(header.ends_with("\n\n"));
    }

    #[test]
    fn test_mix_proxies() {
        let request = GenerationRequest::new("example.com", "uuid-1");
        let yaml = render(&request, &records(), timestamp()).unwrap();
        let doc = parse(&yaml);
        let proxies = doc["proxies"].as_sequence().unwrap();
        assert_eq!(proxies.len(), 4);

        let vmess = &proxies[0];
        assert_eq!(vmess["type"], "vmess");
        assert_eq!(vmess["name"], "[1] ID - ProviderA [VMess-TLS]");
        assert_eq!(vmess["alterId"], 0);
        assert_eq!(vmess["cipher"], "zero");
        assert_eq!(vmess["skip-cert-verify"], true);
        assert_eq!(vmess["ws-opts"]["path"], "/Free/1.1.1.1-80");
        assert_eq!(vmess["ws-opts"]["headers"]["Host"], "example.com");

        assert_eq!(proxies[1]["type"], "vless");
        assert!(proxies[1].get("alterId").is_none());
        assert_eq!(proxies[2]["password"], "uuid-1");
        assert_eq!(proxies[2]["sni"], "example.com");

        let ss = &proxies[3];
        assert_eq!(ss["type"], "ss");
        assert_eq!(ss["cipher"], "none");
        assert_eq!(ss["plugin"], "v2ray-plugin");
        assert_eq!(ss["plugin-opts"]["mode"], "websocket");
        assert_eq!(ss["plugin-opts"]["mux"], false);
        assert!(ss.get("ws-opts").is_none());
    }

    #[test]
    fn test_wildcard_server() {
        let request = GenerationRequest::new("example.com", "id")
            .with_protocol(ProtocolSelection::Single(Protocol::VLess))
            .with_tls(false)
            .with_bugs(vec!["cdn".into()], BugMode::Wildcard);
        let doc = parse(&render(&request, &records(), timestamp()).unwrap());
        let proxy = &doc["proxies"][0];
        assert_eq!(proxy["server"], "cdn.example.com");
        assert_eq!(proxy["port"], 80);
        assert_eq!(proxy["tls"], false);
        assert_eq!(proxy["name"], "[1] ID - ProviderA [VLESS-NTLS]");
    }

    #[test]
    fn test_empty_records() {
        let request = GenerationRequest::new("example.com", "id");
        let yaml = render(&request, &[], timestamp()).unwrap();
        let doc = parse(&yaml);
        assert!(doc["proxies"].as_sequence().unwrap().is_empty());
    }
}
