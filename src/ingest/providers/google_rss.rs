use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::send_with_retry;
use crate::config::provider::ProviderSettings;
use crate::ingest::clean_text;
use crate::ingest::types::{NewsProvider, RawArticle};
use crate::record::{Published, Region};

const DEFAULT_BASE_URL: &str = "https://news.google.com";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}
#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<Published> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| chrono::DateTime::from_timestamp(dt.unix_timestamp(), 0))
        .map(Published::At)
}

/// Google appends " - Publisher" to every headline; drop it when it matches the source.
fn strip_publisher_suffix(title: &str, source: Option<&str>) -> String {
    match source {
        Some(src) if !src.is_empty() => title
            .strip_suffix(src)
            .and_then(|t| t.strip_suffix(" - "))
            .unwrap_or(title)
            .to_string(),
        _ => title.to_string(),
    }
}

/// Google's "when:" operator for the configured time period, if it has one.
fn when_operator(time_period: &str) -> Option<&'static str> {
    match time_period {
        "last_hour" => Some("when:1h"),
        "last_day" | "last_24_hours" => Some("when:1d"),
        "last_week" => Some("when:7d"),
        _ => None,
    }
}

pub struct GoogleRssProvider {
    client: reqwest::Client,
    base_url: String,
    language: String,
    time_period: String,
    max_retries: u8,
}

impl GoogleRssProvider {
    pub fn from_settings(cfg: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            language: cfg.language.clone(),
            time_period: cfg.time_period.clone(),
            max_retries: cfg.max_retries,
        }
    }

    /// Search feed URL, e.g. `/rss/search?q=tiktok+when:1h&hl=es-419&gl=AR&ceid=AR:es-419`.
    pub fn search_url(
        base_url: &str,
        query: &str,
        region: Region,
        language: &str,
        time_period: &str,
    ) -> Result<url::Url> {
        let gl = region.code().to_ascii_uppercase();
        let q = match when_operator(time_period) {
            Some(op) => format!("{query} {op}"),
            None => query.to_string(),
        };
        let ceid = format!("{gl}:{language}");
        url::Url::parse_with_params(
            &format!("{base_url}/rss/search"),
            &[
                ("q", q.as_str()),
                ("hl", language),
                ("gl", gl.as_str()),
                ("ceid", ceid.as_str()),
            ],
        )
        .context("building google news url")
    }

    pub fn parse_items_from_str(s: &str) -> Result<Vec<RawArticle>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing google news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let source = it
                .source
                .and_then(|s| s.name)
                .map(|s| clean_text(&s))
                .filter(|s| !s.is_empty());
            let title = clean_text(it.title.as_deref().unwrap_or_default());
            let title = strip_publisher_suffix(&title, source.as_deref());
            // The description only repeats headline and publisher as HTML links.
            let snippet = it
                .description
                .as_deref()
                .map(clean_text)
                .filter(|d| !d.is_empty() && !d.starts_with(&title));

            out.push(RawArticle {
                title,
                link: it.link.unwrap_or_default(),
                source,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                snippet,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl NewsProvider for GoogleRssProvider {
    async fn search(&self, query: &str, region: Region) -> Result<Vec<RawArticle>> {
        let t0 = std::time::Instant::now();
        let url = Self::search_url(
            &self.base_url,
            query,
            region,
            &self.language,
            &self.time_period,
        )?;
        let rsp = send_with_retry(
            || self.client.get(url.clone()),
            self.max_retries,
            "google news rss get",
        )
        .await?;
        let body = rsp.text().await.context("google news rss .text()")?;
        let items = Self::parse_items_from_str(&body)?;

        histogram!("collector_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("collector_provider_items_total", "provider" => "google_rss")
            .increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "google_rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_is_region_scoped() {
        let url = GoogleRssProvider::search_url(
            DEFAULT_BASE_URL,
            "tiktok",
            Region::Cl,
            "es-419",
            "last_hour",
        )
        .unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://news.google.com/rss/search?"));
        assert!(s.contains("q=tiktok+when%3A1h"));
        assert!(s.contains("gl=CL"));
        assert!(s.contains("ceid=CL%3Aes-419"));
    }

    #[test]
    fn publisher_suffix_is_removed_only_when_it_matches() {
        assert_eq!(
            strip_publisher_suffix("TikTok y la ley - Infobae", Some("Infobae")),
            "TikTok y la ley"
        );
        assert_eq!(
            strip_publisher_suffix("TikTok - Clarín", Some("Infobae")),
            "TikTok - Clarín"
        );
        assert_eq!(strip_publisher_suffix("Sin fuente", None), "Sin fuente");
    }

    #[test]
    fn empty_channel_yields_no_items() {
        let xml = "<rss><channel><title>x</title></channel></rss>";
        assert!(GoogleRssProvider::parse_items_from_str(xml)
            .unwrap()
            .is_empty());
    }
}
