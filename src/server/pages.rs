//! Minimal HTML pages served under `/sub` and `/web`

use crate::config::Config;
use crate::render::SubscriptionFormat;
use crate::server::handlers::request_hostname;
use crate::server::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use html_escape::{encode_double_quoted_attribute, encode_text};

const STYLE: &str = "body{font-family:system-ui,sans-serif;background:#0f172a;color:#e2e8f0;margin:0;padding:24px}\
.card{max-width:920px;margin:0 auto;background:#111827;border:1px solid #1f2937;border-radius:16px;padding:20px}\
label{display:block;margin:.5rem 0 .25rem;color:#cbd5e1}\
input,select,textarea{width:100%;padding:.6rem;border-radius:10px;background:#0b1220;border:1px solid #1e293b;color:#e2e8f0}\
.row{display:grid;grid-template-columns:repeat(2,minmax(0,1fr));gap:12px}\
button{background:#2563eb;border:none;padding:.7rem 1rem;border-radius:10px;color:#fff;margin-top:12px}\
textarea{height:260px}.muted{color:#94a3b8}";

fn options(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| {
            format!(
                "<option value=\"{}\">{}</option>",
                encode_double_quoted_attribute(v),
                encode_text(v)
            )
        })
        .collect()
}

/// Generator form; submits to `/sub/{format}` and shows the answer
pub fn generator_page(config: &Config, hostname: &str) -> String {
    let domains: Vec<&str> = config.server_domains.iter().map(String::as_str).collect();
    let title = encode_text(&config.ui_title);

    format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"/><meta name="viewport" content="width=device-width, initial-scale=1"/>
<title>{title}</title><style>{style}</style></head>
<body><div class="card">
<h2>{title}</h2>
<p class="muted">Hostname: <strong>{host}</strong></p>
<div class="row">
<div><label>Type</label><select id="type">{types}</select></div>
<div><label>TLS</label><select id="tls">{tls}</select></div>
</div>
<div class="row">
<div><label>Bug (host)</label><input id="bug" placeholder="cdn, or wildcard label"/></div>
<div><label>Main Domain</label><select id="mainDomain">{domains}</select></div>
</div>
<div class="row">
<div><label>Wildcard</label><select id="wildcard">{wildcard}</select></div>
<div><label>CC / Country</label><input id="cc" placeholder="ID / SG / Indonesia / Singapore"/></div>
</div>
<div class="row">
<div><label>Limit</label><input id="limit" type="number" min="1" max="{max}" value="{default}"/></div>
<div><label>Format</label><select id="fmt">{formats}</select></div>
</div>
<button id="gen">Generate</button>
<p class="muted">Result:</p>
<textarea id="out" readonly></textarea>
</div>
<script>
const $ = id => document.getElementById(id);
$("gen").onclick = async () => {{
  const q = new URLSearchParams({{
    type: $("type").value,
    tls: $("tls").value,
    bug: $("bug").value.trim() || $("mainDomain").value,
    wildcard: $("wildcard").value,
    cc: $("cc").value.trim(),
    limit: $("limit").value
  }});
  const r = await fetch("/sub/" + $("fmt").value + "?" + q.toString());
  $("out").value = await r.text();
}};
</script>
</body></html>"#,
        title = title,
        style = STYLE,
        host = encode_text(hostname),
        types = options(&["mix", "vmess", "vless", "trojan", "shadowsocks"]),
        tls = options(&["true", "false"]),
        domains = options(&domains),
        wildcard = options(&["false", "true"]),
        max = config.max_proxies,
        default = config.default_proxy_count,
        formats = options(SubscriptionFormat::path_names()),
    )
}

/// Landing page with example subscription URLs
pub fn landing_page(config: &Config, hostname: &str) -> String {
    let title = encode_text(&config.ui_title);
    let host = encode_text(hostname);

    format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"/><meta name="viewport" content="width=device-width, initial-scale=1"/>
<title>{title}</title><style>{style}</style></head>
<body><div class="card">
<h1>{title}</h1>
<p>Use <code>/sub</code> for the generator form, or call an endpoint directly:</p>
<pre>https://{host}/sub/clash?type=mix&amp;tls=true&amp;wildcard=true&amp;bug=cdn&amp;cc=ID&amp;limit=10
https://{host}/sub/v2ray?type=vless&amp;cc=Singapore&amp;limit=5</pre>
<p class="muted">Hostname: <strong>{host}</strong></p>
</div></body></html>"#,
        title = title,
        style = STYLE,
        host = host,
    )
}

/// `GET /sub`
pub async fn generator_form(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let hostname = request_hostname(&headers, state.config.primary_domain());
    Html(generator_page(&state.config, &hostname))
}

/// `GET /web`
pub async fn landing(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let hostname = request_hostname(&headers, state.config.primary_domain());
    Html(landing_page(&state.config, &hostname))
}
