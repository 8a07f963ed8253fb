//! State of an interactive link-building session
//!
//! Everything the terminal UI shows lives here, so the UI itself only draws
//! and forwards key presses.

use crate::config::Config;
use crate::link::{
    encode, BugMode, GenerationRequest, HostPolicy, Protocol, ProtocolSelection,
    SsStyle,
};
use crate::proxy::models::{LivenessResult, LivenessStatus, ProxyRecord};
use crate::proxy::parser::ProxyParser;
use std::collections::HashMap;
use uuid::Uuid;

/// Rows shown per page
pub const PAGE_SIZE: usize = 10;

/// Bug hosts offered in the form, as (label, host). `Default` means none.
pub const BUG_PRESETS: [(&str, &str); 4] = [
    ("Default", ""),
    ("ZOOM", "support.zoom.us"),
    ("AVA", "ava.game.naver.com"),
    ("MIDTRANS", "api.midtrans.com"),
];

/// Bug host selected in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BugChoice {
    /// Index into [`BUG_PRESETS`]
    Preset(usize),
    /// Free text, possibly comma-separated
    Manual(String),
}

impl BugChoice {
    pub fn label(&self) -> String {
        match self {
            BugChoice::Preset(i) => {
                let (label, host) = BUG_PRESETS[*i % BUG_PRESETS.len()];
                if host.is_empty() {
                    label.to_string()
                } else {
                    format!("{} ({})", label, host)
                }
            }
            BugChoice::Manual(text) => format!("Manual: {}", text),
        }
    }

    /// True for a preset that names an actual host
    fn is_real_preset(&self) -> bool {
        matches!(self, BugChoice::Preset(i) if !BUG_PRESETS[*i % BUG_PRESETS.len()].1.is_empty())
    }
}

/// Link form fields
#[derive(Debug, Clone)]
pub struct LinkForm {
    pub protocol: Protocol,
    pub tls: bool,
    pub bug: BugChoice,
    pub wildcard: bool,
    /// Index into the configured server domains
    pub domain_index: usize,
}

impl Default for LinkForm {
    fn default() -> Self {
        Self {
            protocol: Protocol::VLess,
            tls: true,
            bug: BugChoice::Preset(0),
            wildcard: false,
            domain_index: 0,
        }
    }
}

/// Interactive session state
#[derive(Debug, Clone)]
pub struct LinkSession {
    records: Vec<ProxyRecord>,
    filtered: Vec<ProxyRecord>,
    search: String,
    page: usize,
    /// Row within the current page
    cursor: usize,
    liveness: HashMap<String, LivenessStatus>,
    form: LinkForm,
    server_domains: Vec<String>,
    identity: String,
    path_template: String,
    link: Option<String>,
}

impl LinkSession {
    pub fn new(records: Vec<ProxyRecord>, config: &Config) -> Self {
        let mut session = Self {
            records: Vec::new(),
            filtered: Vec::new(),
            search: String::new(),
            page: 0,
            cursor: 0,
            liveness: HashMap::new(),
            form: LinkForm::default(),
            server_domains: config.server_domains.clone(),
            identity: config.identity.clone(),
            path_template: config.path_template.clone(),
            link: None,
        };
        session.set_records(records);
        session
    }

    /// Replace the record set; search, paging and liveness start over
    pub fn set_records(&mut self, records: Vec<ProxyRecord>) {
        self.records = records;
        self.liveness.clear();
        self.refilter();
    }

    pub fn records(&self) -> &[ProxyRecord] {
        &self.records
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
        self.refilter();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search.push(c);
        self.refilter();
    }

    pub fn pop_search_char(&mut self) {
        if self.search.pop().is_some() {
            self.refilter();
        }
    }

    fn refilter(&mut self) {
        self.filtered = ProxyParser::search(&self.records, &self.search);
        self.page = 0;
        self.cursor = 0;
    }

    /// Number of pages, at least one
    pub fn page_count(&self) -> usize {
        self.filtered.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Zero-based current page
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            self.cursor = 0;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            self.cursor = 0;
            true
        } else {
            false
        }
    }

    /// Rows on the current page
    pub fn visible(&self) -> &[ProxyRecord] {
        let start = (self.page * PAGE_SIZE).min(self.filtered.len());
        let end = (start + PAGE_SIZE).min(self.filtered.len());
        &self.filtered[start..end]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn select_next(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.cursor = (self.cursor + 1) % len;
        }
    }

    pub fn select_prev(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.cursor = (self.cursor + len - 1) % len;
        }
    }

    pub fn selected_record(&self) -> Option<&ProxyRecord> {
        self.visible().get(self.cursor)
    }

    /// Mark visible rows without a status as `Checking` and return them
    pub fn begin_checks(&mut self) -> Vec<ProxyRecord> {
        let pending: Vec<ProxyRecord> = self
            .visible()
            .iter()
            .filter(|r| !self.liveness.contains_key(&r.key()))
            .cloned()
            .collect();

        for record in &pending {
            self.liveness.insert(record.key(), LivenessStatus::Checking);
        }
        pending
    }

    /// Record a check result. Results for rows that are no longer visible
    /// are dropped and `false` is returned.
    pub fn apply_result(&mut self, result: LivenessResult) -> bool {
        let key = result.record.key();
        let visible = self.visible().iter().any(|r| r.key() == key);
        if !visible {
            self.liveness.remove(&key);
            return false;
        }
        self.liveness.insert(key, result.status);
        true
    }

    pub fn status_of(&self, record: &ProxyRecord) -> Option<LivenessStatus> {
        self.liveness.get(&record.key()).copied()
    }

    pub fn form(&self) -> &LinkForm {
        &self.form
    }

    pub fn server_domains(&self) -> &[String] {
        &self.server_domains
    }

    pub fn main_domain(&self) -> &str {
        self.server_domains
            .get(self.form.domain_index)
            .map(String::as_str)
            .unwrap_or("localhost")
    }

    pub fn cycle_protocol(&mut self) {
        let i = Protocol::ALL
            .iter()
            .position(|p| *p == self.form.protocol)
            .unwrap_or(0);
        self.form.protocol = Protocol::ALL[(i + 1) % Protocol::ALL.len()];
    }

    /// UUID / password put into generated links
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Replace the identity with a fresh random UUID
    pub fn regenerate_identity(&mut self) -> &str {
        self.identity = Uuid::new_v4().to_string();
        &self.identity
    }

    pub fn toggle_tls(&mut self) {
        self.form.tls = !self.form.tls;
    }

    /// Step through the presets and then manual entry
    pub fn cycle_bug(&mut self) {
        self.form.bug = match &self.form.bug {
            BugChoice::Preset(i) if i + 1 < BUG_PRESETS.len() => BugChoice::Preset(i + 1),
            BugChoice::Preset(_) => BugChoice::Manual(String::new()),
            BugChoice::Manual(_) => BugChoice::Preset(0),
        };
        if !self.form.bug.is_real_preset() {
            self.form.wildcard = false;
        }
    }

    pub fn set_manual_bug(&mut self, text: &str) {
        self.form.bug = BugChoice::Manual(text.to_string());
        self.form.wildcard = false;
    }

    /// Wildcard is only available for a preset bug host
    pub fn toggle_wildcard(&mut self) -> bool {
        if self.form.bug.is_real_preset() {
            self.form.wildcard = !self.form.wildcard;
            true
        } else {
            false
        }
    }

    pub fn cycle_domain(&mut self) {
        if !self.server_domains.is_empty() {
            self.form.domain_index = (self.form.domain_index + 1) % self.server_domains.len();
        }
    }

    /// Generation request for the current form
    pub fn build_request(&self) -> GenerationRequest {
        let (bugs, mode) = match &self.form.bug {
            BugChoice::Preset(i) => {
                let host = BUG_PRESETS[*i % BUG_PRESETS.len()].1;
                if host.is_empty() {
                    (Vec::new(), BugMode::None)
                } else if self.form.wildcard {
                    (vec![host.to_string()], BugMode::Wildcard)
                } else {
                    (vec![host.to_string()], BugMode::Plain)
                }
            }
            BugChoice::Manual(text) => {
                let host = text.trim();
                if host.is_empty() {
                    (Vec::new(), BugMode::None)
                } else {
                    (vec![host.to_string()], BugMode::Plain)
                }
            }
        };

        GenerationRequest::new(self.main_domain(), &self.identity)
            .with_protocol(ProtocolSelection::Single(self.form.protocol))
            .with_tls(self.form.tls)
            .with_bugs(bugs, mode)
            .with_path_template(&self.path_template)
    }

    /// Build the link for the selected record; `None` when nothing is selected
    pub fn generate(&mut self) -> Option<&str> {
        let record = self.selected_record()?.clone();
        let links = encode(
            &self.build_request(),
            std::slice::from_ref(&record),
            HostPolicy::Fronted,
            SsStyle::Sip002,
        );
        self.link = Some(links.join("\n"));
        self.link.as_deref()
    }

    /// Last generated link
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }
}
