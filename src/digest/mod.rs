// src/digest/mod.rs
//! Digest sender job: resolve the window for the trigger time, select records captured
//! inside it, group by region, render and dispatch one message.

pub mod render;
pub mod schedule;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DigestError;
use crate::notify::{MessageTransport, OutgoingMessage};
use crate::record::{Dataset, Record, Region};
use render::render_digest;
use schedule::{Schedule, Window};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_selected_total", "Records inside the resolved window.");
        describe_counter!("digest_sent_total", "Digest messages handed to the transport.");
        describe_counter!("digest_skipped_total", "Empty digests not sent (policy skip).");
        describe_counter!("digest_transport_errors_total", "Failed digest sends.");
        describe_gauge!("digest_last_sent_ts", "Unix ts of the last successful send.");
    });
}

/// What to do when the window selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDigestPolicy {
    /// Send a "no news" message so recipients can tell the job ran.
    #[default]
    Send,
    Skip,
}

/// Upper bound for `trigger_tolerance_minutes`: half a day.
pub const MAX_TRIGGER_TOLERANCE_MINUTES: i64 = 12 * 60;

fn default_max_per_region() -> usize {
    20
}
fn default_tolerance_minutes() -> i64 {
    60
}
fn default_subject_prefix() -> String {
    "News report".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Empty in the file means: NOTIFY_EMAIL_TO (comma separated).
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_max_per_region")]
    pub max_per_region: usize,
    #[serde(default)]
    pub empty_digest: EmptyDigestPolicy,
    /// How far the trigger may drift from a slot boundary and still match it.
    #[serde(default = "default_tolerance_minutes")]
    pub trigger_tolerance_minutes: i64,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default)]
    pub schedule: Schedule,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            max_per_region: default_max_per_region(),
            empty_digest: EmptyDigestPolicy::default(),
            trigger_tolerance_minutes: default_tolerance_minutes(),
            subject_prefix: default_subject_prefix(),
            schedule: Schedule::default(),
        }
    }
}

/// Records of one region kept for the digest, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGroup {
    pub region: Region,
    pub records: Vec<Record>,
    /// Older records left out by the per-region cap.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    SentEmpty,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub window: Window,
    pub selected: usize,
    pub per_region: Vec<(Region, usize)>,
    pub dropped: usize,
    pub dispatch: Dispatch,
}

/// Records with `window.start <= captured_at < window.end`, in dataset order.
pub fn select<'a>(dataset: &'a Dataset, window: &Window) -> Vec<&'a Record> {
    dataset
        .records()
        .iter()
        .filter(|r| window.contains(r.captured_at))
        .collect()
}

/// Partition by region (enum order), sort each group by `captured_at` ascending (stable)
/// and keep the most recent `max_per_region`.
pub fn group_by_region(selected: &[&Record], max_per_region: usize) -> Vec<RegionGroup> {
    let mut by_region: BTreeMap<Region, Vec<Record>> = BTreeMap::new();
    for rec in selected {
        by_region.entry(rec.region).or_default().push((*rec).clone());
    }
    by_region
        .into_iter()
        .map(|(region, mut records)| {
            records.sort_by_key(|r| r.captured_at);
            let dropped = records.len().saturating_sub(max_per_region);
            records.drain(..dropped);
            RegionGroup {
                region,
                records,
                dropped,
            }
        })
        .collect()
}

/// Run the digest once for trigger time `now`.
pub async fn run(
    now: DateTime<Utc>,
    settings: &DigestSettings,
    offset: FixedOffset,
    dataset: &Dataset,
    transport: &dyn MessageTransport,
) -> Result<DigestReport, DigestError> {
    ensure_metrics_described();

    let tolerance = Duration::minutes(
        settings
            .trigger_tolerance_minutes
            .clamp(0, MAX_TRIGGER_TOLERANCE_MINUTES),
    );
    let window = settings
        .schedule
        .resolve(now, offset, tolerance)
        .ok_or(DigestError::NoMatchingSlot {
            at: now.with_timezone(&offset),
        })?;

    let selected = select(dataset, &window);
    counter!("digest_selected_total").increment(selected.len() as u64);
    let groups = group_by_region(&selected, settings.max_per_region);
    let per_region: Vec<(Region, usize)> =
        groups.iter().map(|g| (g.region, g.records.len())).collect();
    let dropped: usize = groups.iter().map(|g| g.dropped).sum();

    tracing::info!(
        target: "digest",
        window = %window.label,
        selected = selected.len(),
        dropped,
        "window resolved"
    );

    let mut report = DigestReport {
        window,
        selected: selected.len(),
        per_region,
        dropped,
        dispatch: Dispatch::Skipped,
    };

    if groups.is_empty() && settings.empty_digest == EmptyDigestPolicy::Skip {
        counter!("digest_skipped_total").increment(1);
        tracing::info!(target: "digest", "no news in window, skipping send");
        return Ok(report);
    }

    let rendered = render_digest(&report.window, &groups, &settings.subject_prefix, offset);
    let msg = OutgoingMessage {
        recipients: settings.recipients.clone(),
        subject: rendered.subject,
        text: rendered.text,
        html: Some(rendered.html),
    };

    if let Err(e) = transport.send(&msg).await {
        counter!("digest_transport_errors_total").increment(1);
        return Err(DigestError::TransportFailed(e));
    }
    counter!("digest_sent_total").increment(1);
    gauge!("digest_last_sent_ts").set(now.timestamp() as f64);

    report.dispatch = if groups.is_empty() {
        Dispatch::SentEmpty
    } else {
        Dispatch::Sent
    };
    tracing::info!(
        target: "digest",
        transport = transport.name(),
        recipients = msg.recipients.len(),
        "digest sent"
    );
    Ok(report)
}
