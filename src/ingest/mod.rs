// src/ingest/mod.rs
//! Collector job: query the provider once per region, normalize, dedup by canonical
//! link and append to the dataset.

pub mod classify;
pub mod link;
pub mod providers;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::error::{CollectorError, RegionFailure};
use crate::ingest::classify::{Classifier, DynClassifier};
use crate::ingest::link::{canonicalize_link, host_of};
use crate::ingest::types::{NewsProvider, RawArticle};
use crate::record::{Record, Region};
use crate::store::DatasetStore;

pub const SNIPPET_MAX_CHARS: usize = 1500;

/// One-time metrics registration (so series show up in the export).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collector_fetched_total", "Raw entries returned by the provider.");
        describe_counter!(
            "collector_appended_total",
            "Records appended to the dataset."
        );
        describe_counter!(
            "collector_duplicates_total",
            "Entries dropped because their canonical link was already known."
        );
        describe_counter!(
            "collector_discarded_total",
            "Entries dropped for an empty link or the mention filter."
        );
        describe_counter!(
            "collector_provider_errors_total",
            "Region queries that failed."
        );
        describe_counter!(
            "collector_provider_items_total",
            "Items parsed per provider."
        );
        describe_counter!(
            "collector_classified_total",
            "Records labelled by the sentiment classifier."
        );
        describe_histogram!("collector_fetch_ms", "Provider fetch + parse time in milliseconds.");
        describe_gauge!(
            "collector_last_run_ts",
            "Unix ts when the collector last finished successfully."
        );
    });
}

/// Clean provider text: decode entities, strip tags, fold whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace (covers NBSP after decoding)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

fn cap_chars(s: String, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s
    }
}

/// Options that shape how raw entries turn into records.
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Keep only entries whose title or snippet mentions this term (case-insensitive).
    pub require_mention: Option<String>,
    /// Labels new records before they are stored.
    pub classifier: Option<DynClassifier>,
}

fn mentions(rec: &Record, term: &str) -> bool {
    let needle = term.to_lowercase();
    rec.title.to_lowercase().contains(&needle)
        || rec
            .snippet
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
}

/// Normalize one raw entry. `None` when the entry has no usable link.
pub fn build_record(raw: RawArticle, region: Region, captured_at: DateTime<Utc>) -> Option<Record> {
    let link = canonicalize_link(&raw.link);
    if link.is_empty() {
        return None;
    }
    let source = raw
        .source
        .as_deref()
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .or_else(|| host_of(&link))
        .unwrap_or_default();
    let snippet = raw
        .snippet
        .as_deref()
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .map(|s| cap_chars(s, SNIPPET_MAX_CHARS));

    Some(Record {
        link,
        title: clean_text(&raw.title),
        source,
        region,
        published_at: raw.published_at,
        captured_at,
        snippet,
        sentiment: None,
    })
}

/// Summary of one collector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorReport {
    pub captured_at: DateTime<Utc>,
    /// Newly appended records per successful region, in query order.
    pub per_region: Vec<(Region, usize)>,
    pub failures: Vec<RegionFailure>,
    pub fetched: usize,
    pub discarded: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub appended: usize,
}

impl CollectorReport {
    pub fn appended_for(&self, region: Region) -> Option<usize> {
        self.per_region
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, n)| *n)
    }
}

/// Run the collector once. Per-region provider failures are absorbed into the report;
/// the run only fails when every region failed or the dataset cannot be persisted.
pub async fn run_once<S: DatasetStore + ?Sized>(
    provider: &dyn NewsProvider,
    store: &S,
    regions: &[Region],
    query: &str,
    now: DateTime<Utc>,
    opts: &CollectOptions,
) -> Result<CollectorReport, CollectorError> {
    ensure_metrics_described();

    let mut failures = Vec::new();
    let mut succeeded = Vec::new();
    let mut candidates = Vec::new();
    let mut fetched = 0usize;
    let mut discarded = 0usize;
    let mut filtered = 0usize;

    for &region in regions {
        match provider.search(query, region).await {
            Ok(items) => {
                tracing::info!(
                    target: "collector",
                    provider = provider.name(),
                    %region,
                    items = items.len(),
                    payload_duplicates = duplicate_links_in(&items),
                    "provider returned"
                );
                fetched += items.len();
                for raw in items {
                    let Some(rec) = build_record(raw, region, now) else {
                        discarded += 1;
                        continue;
                    };
                    if let Some(term) = opts.require_mention.as_deref() {
                        if !mentions(&rec, term) {
                            filtered += 1;
                            continue;
                        }
                    }
                    candidates.push(rec);
                }
                succeeded.push(region);
            }
            Err(e) => {
                tracing::warn!(
                    target: "collector",
                    error = ?e,
                    provider = provider.name(),
                    %region,
                    "provider error"
                );
                counter!("collector_provider_errors_total").increment(1);
                failures.push(RegionFailure {
                    region,
                    message: format!("{e:#}"),
                });
            }
        }
    }
    counter!("collector_fetched_total").increment(fetched as u64);

    if !regions.is_empty() && succeeded.is_empty() {
        return Err(CollectorError::AllProvidersFailed { failures });
    }

    if let Some(classifier) = &opts.classifier {
        classify_candidates(classifier.as_ref(), store, &mut candidates).await;
    }

    let candidate_count = candidates.len();
    let appended = store.append_and_save(candidates).await.map_err(|e| {
        if e.is_read_side() {
            CollectorError::DatasetUnreadable(e)
        } else {
            CollectorError::PersistenceWriteFailed(e)
        }
    })?;

    let mut per_region: Vec<(Region, usize)> = succeeded.iter().map(|r| (*r, 0)).collect();
    for rec in &appended {
        if let Some(slot) = per_region.iter_mut().find(|(r, _)| *r == rec.region) {
            slot.1 += 1;
        }
    }
    let duplicates = candidate_count - appended.len();

    counter!("collector_appended_total").increment(appended.len() as u64);
    counter!("collector_duplicates_total").increment(duplicates as u64);
    counter!("collector_discarded_total").increment((discarded + filtered) as u64);
    gauge!("collector_last_run_ts").set(now.timestamp() as f64);

    Ok(CollectorReport {
        captured_at: now,
        per_region,
        failures,
        fetched,
        discarded,
        filtered,
        duplicates,
        appended: appended.len(),
    })
}

/// Label candidates the dataset does not know yet. An unreadable dataset is reported
/// by the following append, so here it only means every candidate gets labelled.
async fn classify_candidates<S: DatasetStore + ?Sized>(
    classifier: &dyn Classifier,
    store: &S,
    candidates: &mut [Record],
) {
    let known = store.load().await.ok();
    let mut labelled = 0u64;
    for rec in candidates.iter_mut() {
        if known.as_ref().is_some_and(|ds| ds.contains_link(&rec.link)) {
            continue;
        }
        let label = classifier.classify(rec).await;
        if label.is_some() {
            labelled += 1;
        }
        rec.sentiment = label;
    }
    tracing::debug!(
        target: "collector",
        classifier = classifier.name(),
        labelled,
        "candidates classified"
    );
    counter!("collector_classified_total").increment(labelled);
}

/// Entries whose canonical link already appeared earlier in the same payload.
pub fn duplicate_links_in(items: &[RawArticle]) -> usize {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|it| !seen.insert(canonicalize_link(&it.link)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn clean_text_strips_tags_and_entities() {
        let s = "  <b>TikTok</b>&nbsp;&amp; la&nbsp;&nbsp;ley\n\t nueva?  ";
        assert_eq!(clean_text(s), "TikTok & la ley nueva?");
    }

    #[test]
    fn build_record_canonicalizes_and_stamps() {
        let raw = RawArticle {
            title: "Nota".into(),
            link: " https://www.infobae.com/nota/?utm_source=x ".into(),
            source: None,
            published_at: None,
            snippet: Some("   ".into()),
        };
        let rec = build_record(raw, Region::Cl, now()).unwrap();
        assert_eq!(rec.link, "https://infobae.com/nota");
        assert_eq!(rec.source, "infobae.com");
        assert_eq!(rec.region, Region::Cl);
        assert_eq!(rec.captured_at, now());
        assert_eq!(rec.snippet, None);
    }

    #[test]
    fn build_record_rejects_empty_link() {
        let raw = RawArticle {
            title: "x".into(),
            link: "  ".into(),
            ..Default::default()
        };
        assert!(build_record(raw, Region::Ar, now()).is_none());
    }

    #[test]
    fn snippet_is_capped() {
        let raw = RawArticle {
            title: "x".into(),
            link: "https://a.com/1".into(),
            snippet: Some("y".repeat(2_000)),
            ..Default::default()
        };
        let rec = build_record(raw, Region::Ar, now()).unwrap();
        assert_eq!(rec.snippet.unwrap().chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn counts_in_payload_duplicates() {
        let items = vec![
            RawArticle {
                link: "https://a.com/1".into(),
                ..Default::default()
            },
            RawArticle {
                link: "https://www.a.com/1/".into(),
                ..Default::default()
            },
        ];
        assert_eq!(duplicate_links_in(&items), 1);
    }
}
