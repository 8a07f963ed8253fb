//! Per-node planning shared by every output format

use crate::link::{GenerationRequest, HostPolicy, Protocol};
use crate::proxy::models::ProxyRecord;

/// One (record, host, protocol) combination ready to be encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedNode {
    /// 1-based position in the emitted sequence
    pub index: usize,
    pub protocol: Protocol,
    pub display_name: String,
    /// Address the client connects to
    pub server: String,
    /// WebSocket Host header
    pub host_header: String,
    /// TLS server name; `None` when it must be left out
    pub sni: Option<String>,
    pub path: String,
    pub port: u16,
    pub tls: bool,
    pub identity: String,
}

/// Route addresses resolved for one host
struct Addresses {
    server: String,
    host_header: String,
    sni: Option<String>,
}

/// Substitute `{ip}` and `{port}` into a path template
pub fn render_path(template: &str, record: &ProxyRecord) -> String {
    template
        .replace("{ip}", &record.ip)
        .replace("{port}", &record.port)
}

/// Node name: `[n] {country} - {provider} [{LABEL}-{TLS|NTLS}]`
pub fn node_name(index: usize, record: &ProxyRecord, protocol: Protocol, tls: bool) -> String {
    format!(
        "[{}] {} [{}-{}]",
        index,
        record.label(),
        protocol.label(),
        if tls { "TLS" } else { "NTLS" }
    )
}

fn resolve(request: &GenerationRequest, policy: HostPolicy, bug: Option<&str>) -> Addresses {
    let host = bug
        .map(|b| request.effective_host(b))
        .unwrap_or_else(|| request.main_domain.clone());

    match policy {
        HostPolicy::Fronted => Addresses {
            server: request.main_domain.clone(),
            sni: request.tls.then(|| host.clone()),
            host_header: host,
        },
        HostPolicy::Direct => Addresses {
            server: host.clone(),
            sni: Some(host.clone()),
            host_header: host,
        },
    }
}

/// Plan every node for a record set.
///
/// Order is record, then bug host (or the main domain alone when no bug host
/// is active), then protocol. Indices are shared across protocols.
pub fn plan_nodes(
    request: &GenerationRequest,
    records: &[ProxyRecord],
    policy: HostPolicy,
) -> Vec<EncodedNode> {
    let bugs = request.active_bug_hosts();
    let hosts: Vec<Option<&str>> = if bugs.is_empty() {
        vec![None]
    } else {
        bugs.into_iter().map(Some).collect()
    };
    let protocols = request.protocol.protocols();

    let mut nodes = Vec::with_capacity(records.len() * hosts.len() * protocols.len());
    for record in records {
        let path = render_path(&request.path_template, record);
        for bug in &hosts {
            let addresses = resolve(request, policy, *bug);
            for protocol in &protocols {
                let index = nodes.len() + 1;
                nodes.push(EncodedNode {
                    index,
                    protocol: *protocol,
                    display_name: node_name(index, record, *protocol, request.tls),
                    server: addresses.server.clone(),
                    host_header: addresses.host_header.clone(),
                    sni: addresses.sni.clone(),
                    path: path.clone(),
                    port: request.port(),
                    tls: request.tls,
                    identity: request.identity.clone(),
                });
            }
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{BugMode, ProtocolSelection};

    fn record() -> ProxyRecord {
        ProxyRecord::new("1.1.1.1", "80", "ID", "ProviderA")
    }

    #[test]
    fn test_render_path() {
        assert_eq!(render_path("/Free/{ip}-{port}", &record()), "/Free/1.1.1.1-80");
    }

    #[test]
    fn test_node_name() {
        assert_eq!(
            node_name(3, &record(), Protocol::VLess, true),
            "[3] ID - ProviderA [VLESS-TLS]"
        );
        assert_eq!(
            node_name(1, &record(), Protocol::Shadowsocks, false),
            "[1] ID - ProviderA [SS-NTLS]"
        );
    }

    #[test]
    fn test_plan_without_bugs() {
        let request = GenerationRequest::new("example.com", "uuid")
            .with_protocol(ProtocolSelection::Single(Protocol::VLess));
        let nodes = plan_nodes(&request, &[record()], HostPolicy::Direct);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].server, "example.com");
        assert_eq!(nodes[0].host_header, "example.com");
        assert_eq!(nodes[0].sni.as_deref(), Some("example.com"));
        assert_eq!(nodes[0].port, 443);
        assert_eq!(nodes[0].path, "/Free/1.1.1.1-80");
    }

    #[test]
    fn test_mix_shares_index_counter() {
        let records = vec![record(), ProxyRecord::new("2.2.2.2", "443", "SG", "B")];
        let request = GenerationRequest::new("example.com", "uuid");
        let nodes = plan_nodes(&request, &records, HostPolicy::Direct);
        assert_eq!(nodes.len(), 8);
        let indices: Vec<usize> = nodes.iter().map(|n| n.index).collect();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());
        assert_eq!(nodes[0].protocol, Protocol::VMess);
        assert_eq!(nodes[3].protocol, Protocol::Shadowsocks);
        assert_eq!(nodes[4].path, "/Free/2.2.2.2-443");
        assert!(nodes[5].display_name.starts_with("[6] SG - B [VLESS"));
    }

    #[test]
    fn test_fronted_policy() {
        let request = GenerationRequest::new("example.com", "uuid")
            .with_protocol(ProtocolSelection::Single(Protocol::VMess))
            .with_bugs(vec!["support.zoom.us".into()], BugMode::Plain);
        let node = &plan_nodes(&request, &[record()], HostPolicy::Fronted)[0];
        assert_eq!(node.server, "example.com");
        assert_eq!(node.host_header, "support.zoom.us");
        assert_eq!(node.sni.as_deref(), Some("support.zoom.us"));

        let request = request.with_tls(false);
        let node = &plan_nodes(&request, &[record()], HostPolicy::Fronted)[0];
        assert_eq!(node.sni, None);
        assert_eq!(node.port, 80);
    }

    #[test]
    fn test_direct_policy_wildcard() {
        let request = GenerationRequest::new("example.com", "uuid")
            .with_protocol(ProtocolSelection::Single(Protocol::Trojan))
            .with_bugs(vec!["cdn".into(), "ava".into()], BugMode::Wildcard);
        let nodes = plan_nodes(&request, &[record()], HostPolicy::Direct);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].server, "cdn.example.com");
        assert_eq!(nodes[0].host_header, "cdn.example.com");
        assert_eq!(nodes[1].sni.as_deref(), Some("ava.example.com"));
    }
}
