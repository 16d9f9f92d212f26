// tests/digest_run.rs
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use news_digest::digest::schedule::{Schedule, Slot};
use news_digest::digest::{self, DigestSettings, Dispatch, EmptyDigestPolicy};
use news_digest::error::DigestError;
use news_digest::notify::RecordingTransport;
use news_digest::record::{Dataset, Record, Region};

fn art() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

/// Local (UTC-3) wall clock to UTC.
fn local(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    art()
        .with_ymd_and_hms(2025, 10, d, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn rec(link: &str, region: Region, captured_at: DateTime<Utc>) -> Record {
    Record {
        link: format!("https://diario.com/{link}"),
        title: format!("Nota {link}"),
        source: "Diario".into(),
        region,
        published_at: None,
        captured_at,
        snippet: None,
        sentiment: None,
    }
}

fn settings() -> DigestSettings {
    DigestSettings {
        recipients: vec!["equipo@example.com".into(), "jefe@example.com".into()],
        ..DigestSettings::default()
    }
}

#[tokio::test]
async fn morning_digest_covers_previous_evening_only() {
    let ds = Dataset::from_records(vec![
        rec("ayer-19", Region::Ar, local(1, 19, 0)),
        rec("hoy-07", Region::Cl, local(2, 7, 0)),
        rec("hoy-09", Region::Ar, local(2, 9, 0)),
    ]);
    let transport = RecordingTransport::new();

    let report = digest::run(local(2, 8, 0), &settings(), art(), &ds, &transport)
        .await
        .expect("digest run");

    assert_eq!(report.window.start, local(1, 18, 0));
    assert_eq!(report.window.end, local(2, 8, 0));
    assert_eq!(report.selected, 2);
    assert_eq!(report.per_region, vec![(Region::Ar, 1), (Region::Cl, 1)]);
    assert_eq!(report.dispatch, Dispatch::Sent);

    let sent = transport.messages();
    assert_eq!(sent.len(), 1);
    let msg = &sent[0];
    assert_eq!(msg.recipients.len(), 2);
    assert_eq!(
        msg.subject,
        "News report (01/10/2025 18:00 - 02/10/2025 08:00)"
    );
    assert!(msg.text.contains("=== Argentina ==="));
    assert!(msg.text.contains("=== Chile ==="));
    assert!(!msg.text.contains("=== Peru ==="));
    assert!(msg.text.contains("https://diario.com/ayer-19"));
    assert!(msg.text.contains("https://diario.com/hoy-07"));
    assert!(!msg.text.contains("hoy-09"));
    assert!(msg.text.find("Argentina") < msg.text.find("Chile"));
    assert!(msg.html.as_deref().is_some_and(|h| h.contains("<h3")));
}

#[tokio::test]
async fn late_trigger_within_tolerance_still_picks_the_slot() {
    let ds = Dataset::from_records(vec![rec("a", Region::Pe, local(2, 12, 0))]);
    let transport = RecordingTransport::new();

    let report = digest::run(local(2, 13, 25), &settings(), art(), &ds, &transport)
        .await
        .unwrap();
    assert_eq!(report.window.start, local(2, 8, 0));
    assert_eq!(report.window.end, local(2, 13, 0));
    assert_eq!(report.selected, 1);
}

#[tokio::test]
async fn trigger_far_from_any_slot_is_rejected() {
    let transport = RecordingTransport::new();
    let err = digest::run(local(2, 10, 30), &settings(), art(), &Dataset::new(), &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::NoMatchingSlot { .. }));
    assert!(transport.messages().is_empty());
}

#[tokio::test]
async fn empty_window_sends_a_no_news_message_by_default() {
    let transport = RecordingTransport::new();
    let report = digest::run(local(2, 18, 0), &settings(), art(), &Dataset::new(), &transport)
        .await
        .unwrap();

    assert_eq!(report.dispatch, Dispatch::SentEmpty);
    let sent = transport.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "No news found for 02/10/2025 13:00 - 02/10/2025 18:00.\n"
    );
}

#[tokio::test]
async fn empty_window_can_be_skipped() {
    let transport = RecordingTransport::new();
    let cfg = DigestSettings {
        empty_digest: EmptyDigestPolicy::Skip,
        ..settings()
    };
    let report = digest::run(local(2, 18, 0), &cfg, art(), &Dataset::new(), &transport)
        .await
        .unwrap();

    assert_eq!(report.dispatch, Dispatch::Skipped);
    assert!(transport.messages().is_empty());
}

#[tokio::test]
async fn transport_failure_is_fatal() {
    let ds = Dataset::from_records(vec![rec("a", Region::Ar, local(2, 7, 0))]);
    let transport = RecordingTransport::failing("connection refused");

    let err = digest::run(local(2, 8, 0), &settings(), art(), &ds, &transport)
        .await
        .unwrap_err();
    match err {
        DigestError::TransportFailed(e) => assert!(e.to_string().contains("connection refused")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn each_region_is_capped_to_its_most_recent_records() {
    let mut records = Vec::new();
    for i in 0..5u32 {
        records.push(rec(&format!("ar-{i}"), Region::Ar, local(2, 9, 10 * i)));
    }
    records.push(rec("pe-0", Region::Pe, local(2, 9, 5)));
    let ds = Dataset::from_records(records);
    let transport = RecordingTransport::new();
    let cfg = DigestSettings {
        max_per_region: 2,
        ..settings()
    };

    let report = digest::run(local(2, 13, 0), &cfg, art(), &ds, &transport)
        .await
        .unwrap();

    assert_eq!(report.selected, 6);
    assert_eq!(report.dropped, 3);
    assert_eq!(report.per_region, vec![(Region::Ar, 2), (Region::Pe, 1)]);
    let text = &transport.messages()[0].text;
    assert!(text.contains("ar-3") && text.contains("ar-4"));
    assert!(!text.contains("ar-0") && !text.contains("ar-2"));
    assert!(text.find("ar-3") < text.find("ar-4"), "oldest first within a region");
}

#[tokio::test]
async fn five_slot_schedule_is_supported() {
    let schedule = Schedule(vec![
        Slot::new("07:00", "19:00", -1, "07:00").unwrap(),
        Slot::new("10:00", "07:00", 0, "10:00").unwrap(),
        Slot::new("13:00", "10:00", 0, "13:00").unwrap(),
        Slot::new("16:00", "13:00", 0, "16:00").unwrap(),
        Slot::new("19:00", "16:00", 0, "19:00").unwrap(),
    ]);
    assert!(schedule.validate().is_ok());
    let cfg = DigestSettings {
        schedule,
        trigger_tolerance_minutes: 30,
        ..settings()
    };

    let ds = Dataset::from_records(vec![
        rec("a", Region::Ar, local(2, 8, 30)),
        rec("b", Region::Ar, local(2, 10, 0)),
    ]);
    let transport = RecordingTransport::new();
    let report = digest::run(local(2, 10, 5), &cfg, art(), &ds, &transport)
        .await
        .unwrap();
    assert_eq!(report.window.end - report.window.start, Duration::hours(3));
    assert_eq!(report.selected, 1, "end bound is exclusive");
}

#[tokio::test]
async fn midnight_trigger_resolves_against_the_right_day() {
    // Slot at 00:30 reporting on the previous local day, triggered a few minutes early.
    let schedule = Schedule(vec![Slot::new("00:30", "00:00", -1, "00:00").unwrap()]);
    let cfg = DigestSettings {
        schedule,
        ..settings()
    };
    let transport = RecordingTransport::new();
    let report = digest::run(local(2, 0, 10), &cfg, art(), &Dataset::new(), &transport)
        .await
        .unwrap();
    assert_eq!(report.window.start, local(1, 0, 0));
    assert_eq!(report.window.end, local(2, 0, 0));
}

#[tokio::test]
async fn oversized_tolerance_is_clamped_instead_of_overflowing() {
    let cfg = DigestSettings {
        trigger_tolerance_minutes: i64::MAX,
        ..settings()
    };
    let transport = RecordingTransport::new();
    let report = digest::run(local(2, 3, 0), &cfg, art(), &Dataset::new(), &transport)
        .await
        .unwrap();
    assert_eq!(report.window.end, local(2, 8, 0));
}
