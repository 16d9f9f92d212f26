// src/ingest/link.rs
//! Link canonicalization. This is the dedup key, so every rule here changes which
//! articles count as "the same".

use url::Url;

/// Query keys removed outright (compared case-insensitively). Any key starting with
/// `utm_` is removed as well.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "gbraid", "wbraid", "msclkid", "mc_cid", "mc_eid", "igshid",
    "yclid", "_hsenc", "_hsmi", "ocid",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Canonical form of an article link:
/// - trimmed; unparseable or non-http(s) input is returned trimmed but otherwise as-is
/// - lowercase scheme and host, leading `www.` removed
/// - default port, userinfo and fragment dropped
/// - repeated `/` collapsed, trailing `/` removed
/// - tracking query parameters removed, the rest kept in order
pub fn canonicalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let scheme = url.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return trimmed.to_string();
    }
    let Some(host) = url.host_str() else {
        return trimmed.to_string();
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut out = format!("{scheme}://{host}");
    // `Url::port` is None for the scheme's default port.
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    let mut path = String::with_capacity(url.path().len());
    for ch in url.path().chars() {
        if ch == '/' && path.ends_with('/') {
            continue;
        }
        path.push(ch);
    }
    while path.ends_with('/') {
        path.pop();
    }
    out.push_str(&path);

    if let Some(query) = url.query() {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !is_tracking_param(key)
            })
            .collect();
        if !kept.is_empty() {
            out.push('?');
            out.push_str(&kept.join("&"));
        }
    }

    out
}

/// Host of a link without `www.`, used when the provider gives no source name.
pub fn host_of(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
