//! Subscription endpoint

use crate::config::Config;
use crate::link::{split_bug_hosts, BugMode, GenerationRequest, ProtocolSelection};
use crate::proxy::parser::ProxyParser;
use crate::proxy::sampler::Sampler;
use crate::render::{self, header_now, SubscriptionFormat};
use crate::server::{reverse_proxy, AppState};
use crate::Result;
use axum::extract::{Path, Query, Request, State};
use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::{debug, error, info, warn};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Leading integer, the way a browser's `parseInt` reads it
static LEADING_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("leading-integer regex is valid"));

/// Raw `/sub/{format}` query string
#[derive(Debug, Default)]
pub struct SubscriptionQuery {
    /// `type`
    pub kind: Option<String>,
    pub tls: Option<String>,
    pub wildcard: Option<String>,
    pub bug: Option<String>,
    pub cc: Option<String>,
    pub country: Option<String>,
    pub limit: Option<String>,
}

/// Parse the leading integer of `raw`; `None` when there is none
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let caps = LEADING_INT.captures(raw)?;
    let digits = caps.get(1)?.as_str();
    match digits.parse::<i64>() {
        Ok(n) => Some(n),
        // Out of range: saturate, the sampler clamps anyway
        Err(_) if digits.starts_with('-') => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}

/// Hostname the request was addressed to, without a port.
/// IPv6 literals keep their brackets.
pub fn request_hostname(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.trim().parse::<Authority>().ok())
        .map(|authority| authority.host().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl SubscriptionQuery {
    /// Collect known keys from decoded query pairs; the first value of a
    /// repeated key wins and unknown keys are ignored
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "type" => &mut query.kind,
                "tls" => &mut query.tls,
                "wildcard" => &mut query.wildcard,
                "bug" => &mut query.bug,
                "cc" => &mut query.cc,
                "country" => &mut query.country,
                "limit" => &mut query.limit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }

    /// Build a generation request for a request addressed to `hostname`
    pub fn to_request(&self, hostname: &str, config: &Config) -> Result<GenerationRequest> {
        let protocol: ProtocolSelection = non_empty(&self.kind).unwrap_or("mix").parse()?;
        let tls = self.tls.as_deref() != Some("false");
        let wildcard = self.wildcard.as_deref() == Some("true");
        let bug = non_empty(&self.bug).unwrap_or(hostname);

        let bug_mode = if wildcard {
            BugMode::Wildcard
        } else if bug != hostname {
            BugMode::Plain
        } else {
            BugMode::None
        };

        let country = non_empty(&self.cc)
            .or_else(|| non_empty(&self.country))
            .unwrap_or("");
        let limit = self.limit.as_deref().and_then(parse_leading_int);

        Ok(GenerationRequest::new(hostname, &config.identity)
            .with_protocol(protocol)
            .with_tls(tls)
            .with_bugs(split_bug_hosts(bug), bug_mode)
            .with_country(country)
            .with_limit(limit)
            .with_path_template(&config.path_template))
    }
}

/// Parse, select and render a subscription from fetched list text
pub fn build_subscription<R: Rng + ?Sized>(
    format: SubscriptionFormat,
    request: &GenerationRequest,
    list_text: &str,
    sampler: &Sampler,
    rng: &mut R,
    generated_at: DateTime<FixedOffset>,
) -> Result<String> {
    let records = ProxyParser::parse(list_text);
    if records.is_empty() {
        warn!("Proxy list holds no records");
    }

    let selected = sampler.select(&records, &request.country, request.limit, rng);
    debug!(
        "Selected {} of {} records for {}",
        selected.len(),
        records.len(),
        format
    );

    render::render(format, request, &selected, generated_at)
}

fn text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
}

/// `GET /sub/{format}`
pub async fn subscription(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    request: Request,
) -> Response {
    let Some(format) = SubscriptionFormat::from_path(&format) else {
        return reverse_proxy::forward(State(state), request).await;
    };
    let query = SubscriptionQuery::from_pairs(pairs);

    let hostname = request_hostname(request.headers(), state.config.primary_domain());
    let generation = match query.to_request(&hostname, &state.config) {
        Ok(generation) => generation,
        Err(e) => return text(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let list_text = match state.fetcher.fetch_text(&state.config.proxy_list_url).await {
        Ok(text) => text,
        Err(e) => {
            error!("Proxy list fetch failed: {}", e);
            return text(StatusCode::BAD_GATEWAY, format!("Proxy list fetch failed: {}", e));
        }
    };

    let rendered = build_subscription(
        format,
        &generation,
        &list_text,
        &state.config.sampler(),
        &mut rand::thread_rng(),
        header_now(),
    );

    match rendered {
        Ok(body) => {
            info!(
                "Served /sub/{} ({}, tls={}) to {}",
                format, generation.protocol, generation.tls, hostname
            );
            text(StatusCode::OK, body)
        }
        Err(e) => {
            error!("Rendering /sub/{} failed: {:#}", format, e);
            text(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}
