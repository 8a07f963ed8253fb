//! sing-box configuration as imported by Nekobox
//!
//! Nodes are wrapped in a fixed skeleton: DNS servers and rules, a TUN and
//! a mixed inbound, an `Internet` selector and a `Best Latency` url-test
//! group over every node.

use crate::link::{plan_nodes, EncodedNode, GenerationRequest, HostPolicy, Protocol};
use crate::proxy::models::ProxyRecord;
use crate::Result;
use anyhow::Context;
use serde_json::{json, Map, Value};

/// Marker line Nekobox expects before the JSON body
pub const DOCUMENT_PREFIX: &str = "##Free##\n";

const URL_TEST_TARGET: &str = "https://detectportal.firefox.com/success.txt";

fn tls_block(node: &EncodedNode) -> Value {
    json!({
        "enabled": true,
        "insecure": false,
        "server_name": node.sni.as_deref().unwrap_or(&node.server),
        "utls": { "enabled": true, "fingerprint": "randomized" }
    })
}

fn multiplex() -> Value {
    json!({ "enabled": false, "max_streams": 32, "protocol": "smux" })
}

fn early_data_transport(node: &EncodedNode) -> Value {
    json!({
        "early_data_header_name": "Sec-WebSocket-Protocol",
        "headers": { "Host": node.host_header },
        "max_early_data": 0,
        "path": node.path,
        "type": "ws"
    })
}

/// One sing-box outbound for a planned node
pub fn outbound(node: &EncodedNode) -> Value {
    let mut out = match node.protocol {
        Protocol::VMess => json!({
            "alter_id": 0,
            "packet_encoding": "",
            "security": "zero",
            "server": node.server,
            "server_port": node.port,
            "transport": {
                "headers": { "Host": node.host_header },
                "path": node.path,
                "type": "ws"
            },
            "uuid": node.identity,
            "type": "vmess",
            "domain_strategy": "prefer_ipv4",
            "tag": node.display_name
        }),
        Protocol::VLess => json!({
            "domain_strategy": "ipv4_only",
            "flow": "",
            "multiplex": multiplex(),
            "packet_encoding": "xudp",
            "server": node.server,
            "server_port": node.port,
            "tag": node.display_name,
            "transport": early_data_transport(node),
            "type": "vless",
            "uuid": node.identity
        }),
        Protocol::Trojan => json!({
            "domain_strategy": "ipv4_only",
            "multiplex": multiplex(),
            "password": node.identity,
            "server": node.server,
            "server_port": node.port,
            "tag": node.display_name,
            "transport": early_data_transport(node),
            "type": "trojan"
        }),
        Protocol::Shadowsocks => {
            return json!({
                "type": "shadowsocks",
                "tag": node.display_name,
                "server": node.server,
                "server_port": node.port,
                "method": "none",
                "password": node.identity,
                "plugin": "v2ray-plugin",
                "plugin_opts": format!(
                    "mux=0;path={};host={};tls={}",
                    node.path,
                    node.host_header,
                    if node.tls { "1" } else { "0" }
                )
            });
        }
    };

    if node.tls {
        if let Value::Object(map) = &mut out {
            map.insert("tls".to_string(), tls_block(node));
        }
    }
    out
}

fn dns() -> Value {
    json!({
        "final": "dns-final",
        "independent_cache": true,
        "rules": [{
            "disable_cache": false,
            "domain": ["family.cloudflare-dns.com"],
            "server": "direct-dns"
        }],
        "servers": [
            {
                "address": "https://family.cloudflare-dns.com/dns-query",
                "address_resolver": "direct-dns",
                "strategy": "ipv4_only",
                "tag": "remote-dns"
            },
            { "address": "local", "strategy": "ipv4_only", "tag": "direct-dns" },
            {
                "address": "local",
                "address_resolver": "dns-local",
                "strategy": "ipv4_only",
                "tag": "dns-final"
            },
            { "address": "local", "tag": "dns-local" },
            { "address": "rcode://success", "tag": "dns-block" }
        ]
    })
}

fn inbounds() -> Value {
    json!([
        {
            "listen": "0.0.0.0",
            "listen_port": 6450,
            "override_address": "8.8.8.8",
            "override_port": 53,
            "tag": "dns-in",
            "type": "direct"
        },
        {
            "domain_strategy": "",
            "endpoint_independent_nat": true,
            "inet4_address": ["172.19.0.1/28"],
            "mtu": 9000,
            "sniff": true,
            "sniff_override_destination": true,
            "stack": "system",
            "tag": "tun-in",
            "type": "tun"
        },
        {
            "domain_strategy": "",
            "listen": "0.0.0.0",
            "listen_port": 2080,
            "sniff": true,
            "sniff_override_destination": true,
            "tag": "mixed-in",
            "type": "mixed"
        }
    ])
}

fn route() -> Value {
    json!({
        "auto_detect_interface": true,
        "rules": [
            { "outbound": "dns-out", "port": [53] },
            { "inbound": ["dns-in"], "outbound": "dns-out" },
            { "network": ["udp"], "outbound": "block", "port": [443], "port_range": [] },
            {
                "ip_cidr": ["224.0.0.0/3", "ff00::/8"],
                "outbound": "block",
                "source_ip_cidr": ["224.0.0.0/3", "ff00::/8"]
            }
        ]
    })
}

/// Full configuration object for a set of planned nodes
pub fn config(nodes: &[EncodedNode]) -> Value {
    let names: Vec<&str> = nodes.iter().map(|n| n.display_name.as_str()).collect();

    let mut selector = vec!["Best Latency"];
    selector.extend(&names);
    selector.push("direct");

    let mut url_test = names.clone();
    url_test.push("direct");

    let mut outbounds = vec![
        json!({ "outbounds": selector, "tag": "Internet", "type": "selector" }),
        json!({
            "interval": "1m0s",
            "outbounds": url_test,
            "tag": "Best Latency",
            "type": "urltest",
            "url": URL_TEST_TARGET
        }),
    ];
    outbounds.extend(nodes.iter().map(outbound));
    outbounds.extend([
        json!({ "tag": "direct", "type": "direct" }),
        json!({ "tag": "bypass", "type": "direct" }),
        json!({ "tag": "block", "type": "block" }),
        json!({ "tag": "dns-out", "type": "dns" }),
    ]);

    let mut root = Map::new();
    root.insert("dns".into(), dns());
    root.insert(
        "experimental".into(),
        json!({
            "cache_file": { "enabled": true, "path": "../cache/clash.db", "store_fakeip": true },
            "clash_api": { "external_controller": "127.0.0.1:9090", "external_ui": "../files/yacd" }
        }),
    );
    root.insert("inbounds".into(), inbounds());
    root.insert("log".into(), json!({ "level": "info" }));
    root.insert("outbounds".into(), Value::Array(outbounds));
    root.insert("route".into(), route());
    Value::Object(root)
}

pub fn render(request: &GenerationRequest, records: &[ProxyRecord]) -> Result<String> {
    let nodes = plan_nodes(request, records, HostPolicy::Direct);
    let body = serde_json::to_string_pretty(&config(&nodes))
        .context("Failed to serialize sing-box configuration")?;
    Ok(format!("{}{}", DOCUMENT_PREFIX, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ProtocolSelection;

    fn parse(doc: &str) -> Value {
        let body = doc.strip_prefix(DOCUMENT_PREFIX).unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn records() -> Vec<ProxyRecord> {
        vec![ProxyRecord::new("1.1.1.1", "80", "ID", "ProviderA")]
    }

    #[test]
    fn test_mix_outbounds() {
        let request = GenerationRequest::new("example.com", "uuid-1");
        let doc = parse(&render(&request, &records()).unwrap());
        let outbounds = doc["outbounds"].as_array().unwrap();
        // selector, urltest, 4 nodes, direct, bypass, block, dns-out
        assert_eq!(outbounds.len(), 10);

        let selector = outbounds[0]["outbounds"].as_array().unwrap();
        assert_eq!(selector.first().unwrap(), "Best Latency");
        assert_eq!(selector.last().unwrap(), "direct");
        assert_eq!(selector.len(), 6);
        assert_eq!(outbounds[1]["type"], "urltest");
        assert_eq!(outbounds[1]["outbounds"].as_array().unwrap().len(), 5);

        let vmess = &outbounds[2];
        assert_eq!(vmess["type"], "vmess");
        assert_eq!(vmess["security"], "zero");
        assert_eq!(vmess["tls"]["server_name"], "example.com");
        assert_eq!(vmess["tls"]["utls"]["fingerprint"], "randomized");
        assert_eq!(vmess["transport"]["headers"]["Host"], "example.com");

        assert_eq!(outbounds[3]["packet_encoding"], "xudp");
        assert_eq!(outbounds[3]["multiplex"]["enabled"], false);
        assert_eq!(outbounds[4]["password"], "uuid-1");

        let ss = &outbounds[5];
        assert_eq!(ss["method"], "none");
        assert_eq!(
            ss["plugin_opts"],
            "mux=0;path=/Free/1.1.1.1-80;host=example.com;tls=1"
        );
        assert!(ss.get("tls").is_none());

        assert_eq!(outbounds[9]["tag"], "dns-out");
    }

    #[test]
    fn test_no_tls_block_without_tls() {
        let request = GenerationRequest::new("example.com", "id")
            .with_protocol(ProtocolSelection::Single(Protocol::VLess))
            .with_tls(false);
        let doc = parse(&render(&request, &records()).unwrap());
        let node = &doc["outbounds"][2];
        assert!(node.get("tls").is_none());
        assert_eq!(node["server_port"], 80);
        assert_eq!(node["tag"], "[1] ID - ProviderA [VLESS-NTLS]");
    }

    #[test]
    fn test_skeleton() {
        let doc = config(&[]);
        assert_eq!(doc["dns"]["final"], "dns-final");
        assert_eq!(doc["dns"]["servers"].as_array().unwrap().len(), 5);
        assert_eq!(doc["inbounds"][1]["type"], "tun");
        assert_eq!(doc["log"]["level"], "info");
        assert_eq!(doc["route"]["rules"][2]["port"][0], 443);
        assert_eq!(doc["outbounds"].as_array().unwrap().len(), 6);
    }
}
