//! Country code normalization and loose country matching

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// ISO 3166-1 alpha-2 codes of the regions proxy lists usually carry
static ISO2_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("ID", "Indonesia"),
        ("SG", "Singapore"),
        ("MY", "Malaysia"),
        ("TH", "Thailand"),
        ("VN", "Vietnam"),
        ("PH", "Philippines"),
        ("JP", "Japan"),
        ("KR", "Korea"),
        ("HK", "Hong Kong"),
        ("TW", "Taiwan"),
        ("CN", "China"),
        ("IN", "India"),
        ("AU", "Australia"),
        ("NZ", "New Zealand"),
        ("US", "United States"),
        ("CA", "Canada"),
        ("MX", "Mexico"),
        ("GB", "United Kingdom"),
        ("UK", "United Kingdom"),
        ("DE", "Germany"),
        ("NL", "Netherlands"),
        ("FR", "France"),
        ("ES", "Spain"),
        ("IT", "Italy"),
        ("TR", "Turkey"),
        ("RU", "Russia"),
        ("AE", "United Arab Emirates"),
        ("SA", "Saudi Arabia"),
    ])
});

/// Map a two-letter code to its display name.
///
/// Empty input means "no filter". Unknown two-letter codes come back
/// uppercased; anything that is not two characters long is returned as is.
pub fn normalize(code: &str) -> String {
    let code = code.trim();
    if code.chars().count() != 2 {
        return code.to_string();
    }

    let iso = code.to_uppercase();
    match ISO2_NAMES.get(iso.as_str()) {
        Some(name) => name.to_string(),
        None => iso,
    }
}

/// Loose, case-insensitive match of a record's country column
pub fn matches(record_country: &str, wanted: &str) -> bool {
    if wanted.is_empty() {
        return true;
    }

    let rc = record_country.to_lowercase();
    let w = wanted.to_lowercase();

    rc == w
        || rc.contains(&format!("({})", w))
        || rc.starts_with(&w)
        || rc.contains(&format!(" {} ", w))
        || rc.ends_with(&format!(" {}", w))
}

/// Country filter built once per request from the raw `cc` value
#[derive(Debug, Clone, Default)]
pub struct CountryFilter {
    wanted: String,
    code: Option<String>,
}

impl CountryFilter {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let wanted = normalize(raw);
        // a mapped code also matches records whose column is exactly that code
        let code = (raw.chars().count() == 2 && !wanted.eq_ignore_ascii_case(raw))
            .then(|| raw.to_uppercase());
        Self { wanted, code }
    }

    /// True when no country was requested
    pub fn is_empty(&self) -> bool {
        self.wanted.is_empty()
    }

    /// The normalized country name
    pub fn wanted(&self) -> &str {
        &self.wanted
    }

    pub fn accepts(&self, record_country: &str) -> bool {
        matches(record_country, &self.wanted)
            || self
                .code
                .as_deref()
                .is_some_and(|code| record_country.trim().eq_ignore_ascii_case(code))
    }
}
