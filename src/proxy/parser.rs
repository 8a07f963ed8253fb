//! Proxy list parser for delimited text feeds

use crate::proxy::models::{ProxyRecord, UNKNOWN_COUNTRY, UNKNOWN_PROVIDER};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Column delimiter detected from the first line of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Pipe,
    Semicolon,
    Comma,
}

impl Delimiter {
    /// Pick the delimiter for a line: tab, then pipe, then semicolon, else comma
    pub fn sniff(line: &str) -> Self {
        if line.contains('\t') {
            Delimiter::Tab
        } else if line.contains('|') {
            Delimiter::Pipe
        } else if line.contains(';') {
            Delimiter::Semicolon
        } else {
            Delimiter::Comma
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Tab => '\t',
            Delimiter::Pipe => '|',
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
        }
    }
}

/// Parser for `ip,port[,country[,provider]]` style proxy lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a whole list.
    ///
    /// The delimiter is sniffed from the first non-blank line only and then
    /// applied to every line, so a line written with another delimiter ends
    /// up misaligned rather than rejected.
    pub fn parse(text: &str) -> Vec<ProxyRecord> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

        let Some(first) = lines.first() else {
            return Vec::new();
        };

        let delimiter = Delimiter::sniff(first);
        debug!("Parsing {} lines with delimiter {:?}", lines.len(), delimiter);

        lines
            .iter()
            .filter_map(|line| Self::parse_line(line, delimiter))
            .collect()
    }

    /// Parse a single line with a known delimiter
    pub fn parse_line(line: &str, delimiter: Delimiter) -> Option<ProxyRecord> {
        let fields: Vec<&str> = line.split(delimiter.as_char()).collect();
        if fields.len() < 2 {
            return None;
        }

        let ip = fields[0].trim();
        let port = fields[1].trim();
        if ip.is_empty() || port.is_empty() {
            return None;
        }

        let country = fields.get(2).map_or(UNKNOWN_COUNTRY, |c| c.trim());
        let provider = fields.get(3).map_or(UNKNOWN_PROVIDER, |p| p.trim());

        Some(ProxyRecord::new(ip, port, country, provider))
    }

    /// Parse a list from a local file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyRecord>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read proxy list {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Case-insensitive substring search over provider and country
    pub fn search(records: &[ProxyRecord], term: &str) -> Vec<ProxyRecord> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return records.to_vec();
        }

        records
            .iter()
            .filter(|r| {
                r.provider.to_lowercase().contains(&term) || r.country.to_lowercase().contains(&term)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_priority() {
        assert_eq!(Delimiter::sniff("a\tb|c;d,e"), Delimiter::Tab);
        assert_eq!(Delimiter::sniff("a|b;c,d"), Delimiter::Pipe);
        assert_eq!(Delimiter::sniff("a;b,c"), Delimiter::Semicolon);
        assert_eq!(Delimiter::sniff("a,b"), Delimiter::Comma);
        assert_eq!(Delimiter::sniff("nothing"), Delimiter::Comma);
    }

    #[test]
    fn test_parse_each_delimiter() {
        for sep in ["\t", "|", ";", ","] {
            let content = format!(
                "1.1.1.1{sep}443{sep}SG{sep}Cloudflare\n 8.8.8.8 {sep} 80 {sep} US {sep} Google \n"
            );
            let records = ProxyParser::parse(&content);
            assert_eq!(records.len(), 2, "delimiter {:?}", sep);
            assert_eq!(records[0], ProxyRecord::new("1.1.1.1", "443", "SG", "Cloudflare"));
            assert_eq!(records[1], ProxyRecord::new("8.8.8.8", "80", "US", "Google"));
        }
    }

    #[test]
    fn test_parse_defaults_for_missing_columns() {
        let records = ProxyParser::parse("1.1.1.1,443\n2.2.2.2,80,JP\n");
        assert_eq!(records[0].country, "Unknown");
        assert_eq!(records[0].provider, "Unknown Provider");
        assert_eq!(records[1].country, "JP");
        assert_eq!(records[1].provider, "Unknown Provider");
    }

    #[test]
    fn test_parse_ignores_extra_columns() {
        let records = ProxyParser::parse("1.1.1.1,443,SG,Cloudflare,extra,more");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider, "Cloudflare");
    }

    #[test]
    fn test_parse_blank_input() {
        assert!(ProxyParser::parse("").is_empty());
        assert!(ProxyParser::parse("\n\r\n   \n\t\n").is_empty());
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let records = ProxyParser::parse("1.1.1.1,443,SG,A\r\n\r\n2.2.2.2,80,ID,B\r\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].provider, "B");
    }

    #[test]
    fn test_parse_drops_short_and_empty_lines() {
        let content = "1.1.1.1,443,SG,A\njust-one-field\n,80,ID,B\n3.3.3.3, ,ID,C\n";
        let records = ProxyParser::parse(content);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, "1.1.1.1");
    }

    #[test]
    fn test_delimiter_comes_from_first_line_only() {
        // the second line uses commas but the list was sniffed as pipe
        let records = ProxyParser::parse("1.1.1.1|443|SG|A\n2.2.2.2,80,ID,B\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, "1.1.1.1");
    }

    #[test]
    fn test_search() {
        let records = vec![
            ProxyRecord::new("1.1.1.1", "443", "SG", "Cloudflare"),
            ProxyRecord::new("2.2.2.2", "443", "ID", "Biznet"),
        ];
        assert_eq!(ProxyParser::search(&records, "").len(), 2);
        assert_eq!(ProxyParser::search(&records, "cloud")[0].ip, "1.1.1.1");
        assert_eq!(ProxyParser::search(&records, " id ")[0].ip, "2.2.2.2");
        assert!(ProxyParser::search(&records, "nowhere").is_empty());
    }
}
