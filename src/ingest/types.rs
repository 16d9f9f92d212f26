// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::record::{Published, Region};

/// One article entry as returned by a provider, before normalization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct RawArticle {
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub published_at: Option<Published>,
    pub snippet: Option<String>,
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    /// One search for `query` scoped to `region`. No ordering guarantee on the result.
    async fn search(&self, query: &str, region: Region) -> Result<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}

/// Parse a provider date. Accepts RFC 3339, RFC 2822 (RSS `pubDate`) and bare
/// `YYYY-MM-DD` / `DD/MM/YYYY` dates, kept as calendar dates. Anything else is `None`.
pub fn parse_published(raw: &str) -> Option<Published> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Published::At(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0).map(Published::At);
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Published::Date(d));
        }
    }
    None
}
