//! Plain link list, one URI per line

use crate::link::{encode, GenerationRequest, HostPolicy, SsStyle};
use crate::proxy::models::ProxyRecord;

pub fn render(request: &GenerationRequest, records: &[ProxyRecord]) -> String {
    encode(request, records, HostPolicy::Direct, SsStyle::Plugin).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{BugMode, Protocol, ProtocolSelection};

    #[test]
    fn test_plain_lines() {
        let request = GenerationRequest::new("example.com", "id")
            .with_protocol(ProtocolSelection::Single(Protocol::Trojan))
            .with_bugs(vec!["a.com".into(), "b.com".into()], BugMode::Plain);
        let records = vec![
            ProxyRecord::new("1.1.1.1", "80", "ID", "A"),
            ProxyRecord::new("2.2.2.2", "80", "SG", "B"),
        ];
        let out = render(&request, &records);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("trojan://id@a.com:443?"));
        assert!(lines[1].starts_with("trojan://id@b.com:443?"));
        assert!(lines[2].contains("%2FFree%2F2.2.2.2-80"));
    }

    #[test]
    fn test_plain_empty() {
        let request = GenerationRequest::new("example.com", "id");
        assert_eq!(render(&request, &[]), "");
    }
}
