// src/digest/render.rs
use chrono::FixedOffset;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use super::schedule::Window;
use super::RegionGroup;
use crate::record::{Record, Sentiment};

const DATE_FMT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn byline(rec: &Record, offset: FixedOffset) -> String {
    let date = rec
        .published_at
        .map(|p| p.local_date(offset).format(DATE_FMT).to_string());
    match (date, rec.source.is_empty()) {
        (Some(d), false) => format!("{d} · {}", rec.source),
        (Some(d), true) => d,
        (None, false) => rec.source.clone(),
        (None, true) => String::new(),
    }
}

fn sentiment_badge(s: Sentiment) -> String {
    let color = match s {
        Sentiment::Positive => "#2e7d32",
        Sentiment::Negative => "#c62828",
        Sentiment::Neutral => "#616161",
    };
    format!(
        "<span style='display:inline-block;padding:2px 8px;border-radius:12px;\
         font-size:12px;color:#fff;background:{color};'>{}</span>",
        s.label()
    )
}

/// Render the subject plus plain-text and HTML bodies. `groups` are expected to be
/// non-empty and already ordered; an empty slice renders the "no news" message.
pub fn render_digest(
    window: &Window,
    groups: &[RegionGroup],
    subject_prefix: &str,
    offset: FixedOffset,
) -> RenderedDigest {
    let subject = format!("{subject_prefix} ({})", window.label);
    if groups.is_empty() {
        return RenderedDigest {
            subject,
            text: format!("No news found for {}.\n", window.label),
            html: format!(
                "<p>No news found for <b>{}</b>.</p>",
                encode_text(&window.label)
            ),
        };
    }

    let mut text = String::new();
    let _ = writeln!(text, "News collected ({}):\n", window.label);
    let mut html = String::new();
    let _ = writeln!(html, "<h2>News collected ({})</h2>", encode_text(&window.label));

    for group in groups {
        let name = group.region.display_name();
        let _ = writeln!(text, "=== {name} ===");
        let _ = writeln!(
            html,
            "<div style='margin-top:28px;margin-bottom:10px;border-bottom:1px solid #eee;'>\
             <h3 style='margin:0 0 10px 0;font-size:18px;'>{name}</h3></div>"
        );

        for rec in &group.records {
            let by = byline(rec, offset);

            match rec.sentiment {
                Some(sent) => {
                    let _ = writeln!(text, "- [{}] {}", sent.label(), rec.title);
                }
                None => {
                    let _ = writeln!(text, "- {}", rec.title);
                }
            }
            if !by.is_empty() {
                let _ = writeln!(text, "  {by}");
            }
            if let Some(snippet) = &rec.snippet {
                let _ = writeln!(text, "  {snippet}");
            }
            let _ = writeln!(text, "  {}", rec.link);

            let _ = write!(
                html,
                "<div style='margin:0 0 22px 0;'>\
                 <div style='font-size:16px;line-height:1.3;margin:0 0 4px 0;'><b>{}</b></div>",
                encode_text(&rec.title)
            );
            if let Some(sent) = rec.sentiment {
                let _ = write!(
                    html,
                    "<div style='margin:0 0 6px 0;'>{}</div>",
                    sentiment_badge(sent)
                );
            }
            if !by.is_empty() {
                let _ = write!(
                    html,
                    "<div style='font-size:12px;color:#666;margin:0 0 6px 0;'>{}</div>",
                    encode_text(&by)
                );
            }
            if let Some(snippet) = &rec.snippet {
                let _ = write!(
                    html,
                    "<div style='font-size:14px;color:#333;margin:0 0 6px 0;'>{}</div>",
                    encode_text(snippet)
                );
            }
            let _ = writeln!(
                html,
                "<a href=\"{}\" target=\"_blank\" style='font-size:13px;color:#1565c0;'>{}</a></div>",
                encode_double_quoted_attribute(&rec.link),
                encode_text(&rec.link)
            );
        }
        text.push('\n');
    }

    RenderedDigest {
        subject,
        text,
        html,
    }
}
