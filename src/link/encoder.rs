//! URI encoders for vmess, vless, trojan and shadowsocks

use crate::link::node::{plan_nodes, EncodedNode};
use crate::link::{GenerationRequest, HostPolicy, Protocol};
use crate::proxy::models::ProxyRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::warn;
use urlencoding::encode as uenc;

/// Shadowsocks cipher; the transport does the real work
const SS_METHOD: &str = "none";

/// How a Shadowsocks node carries its WebSocket settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsStyle {
    /// Plain query parameters, as single-link importers expect
    Sip002,
    /// A `v2ray-plugin` option string, as subscription importers expect
    #[default]
    Plugin,
}

/// VMess share-link payload
#[derive(Debug, Serialize)]
struct VMessLink<'a> {
    v: &'a str,
    ps: &'a str,
    add: &'a str,
    port: u16,
    id: &'a str,
    aid: &'a str,
    net: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    host: &'a str,
    path: &'a str,
    tls: &'a str,
    scy: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sni: Option<&'a str>,
}

/// Base64 of UTF-8 text
pub fn base64_encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

fn security(node: &EncodedNode) -> &'static str {
    if node.tls {
        "tls"
    } else {
        "none"
    }
}

/// SNI only travels with TLS
fn tls_sni(node: &EncodedNode) -> Option<&str> {
    node.sni.as_deref().filter(|_| node.tls)
}

fn sni_param(node: &EncodedNode) -> String {
    tls_sni(node)
        .map(|sni| format!("&sni={}", uenc(sni)))
        .unwrap_or_default()
}

fn encode_vmess(node: &EncodedNode) -> String {
    let payload = VMessLink {
        v: "2",
        ps: &node.display_name,
        add: &node.server,
        port: node.port,
        id: &node.identity,
        aid: "0",
        net: "ws",
        kind: "none",
        host: &node.host_header,
        path: &node.path,
        tls: if node.tls { "tls" } else { "" },
        scy: "zero",
        sni: tls_sni(node),
    };

    match serde_json::to_string(&payload) {
        Ok(json) => format!("vmess://{}", base64_encode(&json)),
        Err(e) => {
            warn!("Failed to serialize vmess payload for {}: {}", node.display_name, e);
            "vmess://".to_string()
        }
    }
}

fn encode_vless(node: &EncodedNode) -> String {
    format!(
        "vless://{}@{}:{}?encryption=none&security={}&type=ws&host={}&path={}{}#{}",
        node.identity,
        node.server,
        node.port,
        security(node),
        node.host_header,
        uenc(&node.path),
        sni_param(node),
        uenc(&node.display_name)
    )
}

fn encode_trojan(node: &EncodedNode) -> String {
    format!(
        "trojan://{}@{}:{}?security={}&type=ws&host={}&path={}{}#{}",
        node.identity,
        node.server,
        node.port,
        security(node),
        node.host_header,
        uenc(&node.path),
        sni_param(node),
        uenc(&node.display_name)
    )
}

/// `v2ray-plugin` option string shared by the ss URI and the Clash renderer
pub fn v2ray_plugin_opts(node: &EncodedNode) -> String {
    let tls = if node.tls { "tls;" } else { "" };
    format!(
        "v2ray-plugin;{}mode=websocket;path={};host={}",
        tls, node.path, node.host_header
    )
}

fn encode_shadowsocks(node: &EncodedNode, style: SsStyle) -> String {
    let user_info = base64_encode(&format!("{}:{}", SS_METHOD, node.identity));
    let base = format!("ss://{}@{}:{}", user_info, node.server, node.port);

    match style {
        SsStyle::Sip002 => format!(
            "{}?encryption=none&type=ws&host={}&path={}&security={}{}#{}",
            base,
            node.host_header,
            uenc(&node.path),
            security(node),
            sni_param(node),
            uenc(&node.display_name)
        ),
        SsStyle::Plugin => format!(
            "{}?plugin={}#{}",
            base,
            uenc(&v2ray_plugin_opts(node)),
            uenc(&node.display_name)
        ),
    }
}

/// Encode one planned node
pub fn encode_node(node: &EncodedNode, ss_style: SsStyle) -> String {
    match node.protocol {
        Protocol::VMess => encode_vmess(node),
        Protocol::VLess => encode_vless(node),
        Protocol::Trojan => encode_trojan(node),
        Protocol::Shadowsocks => encode_shadowsocks(node, ss_style),
    }
}

/// Plan and encode every node for a record set
pub fn encode(
    request: &GenerationRequest,
    records: &[ProxyRecord],
    policy: HostPolicy,
    ss_style: SsStyle,
) -> Vec<String> {
    plan_nodes(request, records, policy)
        .iter()
        .map(|node| encode_node(node, ss_style))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{BugMode, ProtocolSelection};
    use serde_json::Value;

    fn record() -> ProxyRecord {
        ProxyRecord::new("1.1.1.1", "80", "ID", "ProviderA")
    }

    fn request(protocol: Protocol) -> GenerationRequest {
        GenerationRequest::new("example.com", "fccdaaae-af39-41a7-9fde-fd32a48278cf")
            .with_protocol(ProtocolSelection::Single(protocol))
    }

    fn decode_vmess(uri: &str) -> Value {
        let payload = uri.strip_prefix("vmess://").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_vless_end_to_end() {
        let links = encode(&request(Protocol::VLess), &[record()], HostPolicy::Direct, SsStyle::Plugin);
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert!(link.starts_with("vless://fccdaaae-af39-41a7-9fde-fd32a48278cf@example.com:443?"));
        assert!(link.contains("security=tls"));
        assert!(link.contains("path=%2FFree%2F1.1.1.1-80"));
        assert!(link.contains("&sni=example.com#"));
        let name = link.split('#').nth(1).unwrap();
        let name = urlencoding::decode(name).unwrap();
        assert!(name.contains("ID - ProviderA"));
        assert_eq!(name, "[1] ID - ProviderA [VLESS-TLS]");
    }

    #[test]
    fn test_vless_without_tls_has_no_sni() {
        let links = encode(
            &request(Protocol::VLess).with_tls(false),
            &[record()],
            HostPolicy::Direct,
            SsStyle::Plugin,
        );
        assert!(links[0].contains("@example.com:80?"));
        assert!(links[0].contains("security=none"));
        assert!(!links[0].contains("sni="));
    }

    #[test]
    fn test_vmess_payload_round_trip() {
        let request = request(Protocol::VMess)
            .with_bugs(vec!["support.zoom.us".into()], BugMode::Plain);
        let links = encode(&request, &[record()], HostPolicy::Fronted, SsStyle::Sip002);
        let json = decode_vmess(&links[0]);
        assert_eq!(json["add"], "example.com");
        assert_eq!(json["id"], "fccdaaae-af39-41a7-9fde-fd32a48278cf");
        assert_eq!(json["path"], "/Free/1.1.1.1-80");
        assert_eq!(json["host"], "support.zoom.us");
        assert_eq!(json["sni"], "support.zoom.us");
        assert_eq!(json["tls"], "tls");
        assert_eq!(json["port"], 443);
        assert_eq!(json["scy"], "zero");
        assert_eq!(json["v"], "2");
    }

    #[test]
    fn test_vmess_without_tls_omits_sni() {
        let links = encode(
            &request(Protocol::VMess).with_tls(false),
            &[record()],
            HostPolicy::Direct,
            SsStyle::Plugin,
        );
        let json = decode_vmess(&links[0]);
        assert!(json.get("sni").is_none());
        assert_eq!(json["tls"], "");
        assert_eq!(json["port"], 80);
    }

    #[test]
    fn test_trojan() {
        let links = encode(&request(Protocol::Trojan), &[record()], HostPolicy::Direct, SsStyle::Plugin);
        assert!(links[0].starts_with(
            "trojan://fccdaaae-af39-41a7-9fde-fd32a48278cf@example.com:443?security=tls&type=ws&host=example.com&path=%2FFree%2F1.1.1.1-80&sni=example.com#"
        ));
        assert!(links[0].ends_with("%5BTrojan-TLS%5D"));
    }

    #[test]
    fn test_shadowsocks_sip002() {
        let links = encode(
            &request(Protocol::Shadowsocks),
            &[record()],
            HostPolicy::Fronted,
            SsStyle::Sip002,
        );
        let user_info = base64_encode("none:fccdaaae-af39-41a7-9fde-fd32a48278cf");
        assert!(links[0].starts_with(&format!("ss://{}@example.com:443?encryption=none&type=ws", user_info)));
        assert!(links[0].contains("&security=tls&sni=example.com#"));
    }

    #[test]
    fn test_shadowsocks_plugin() {
        let links = encode(
            &request(Protocol::Shadowsocks).with_tls(false),
            &[record()],
            HostPolicy::Direct,
            SsStyle::Plugin,
        );
        let plugin = links[0].split("?plugin=").nth(1).unwrap().split('#').next().unwrap();
        assert_eq!(
            urlencoding::decode(plugin).unwrap(),
            "v2ray-plugin;mode=websocket;path=/Free/1.1.1.1-80;host=example.com"
        );
    }

    #[test]
    fn test_mix_order() {
        let request = GenerationRequest::new("example.com", "id");
        let links = encode(&request, &[record()], HostPolicy::Direct, SsStyle::Plugin);
        let schemes: Vec<&str> = links.iter().map(|l| l.split("://").next().unwrap()).collect();
        assert_eq!(schemes, vec!["vmess", "vless", "trojan", "ss"]);
    }

    #[test]
    fn test_empty_records() {
        let request = GenerationRequest::new("example.com", "id");
        assert!(encode(&request, &[], HostPolicy::Direct, SsStyle::Plugin).is_empty());
    }
}
