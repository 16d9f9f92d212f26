// src/config/mod.rs
//! Static configuration for both jobs: file lookup, parsing, secret resolution from the
//! environment, and validation.

pub mod provider;
pub mod smtp;

use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::{DigestSettings, MAX_TRIGGER_TOLERANCE_MINUTES};
use crate::ingest::classify::SentimentSettings;
use crate::record::Region;
use provider::{ProviderKind, ProviderSettings};
use smtp::SmtpSettings;

pub const ENV_CONFIG_PATH: &str = "NEWS_DIGEST_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/news_digest.toml";
pub const DEFAULT_JSON_PATH: &str = "config/news_digest.json";

const ENV_MARKER: &str = "ENV";

fn default_regions() -> Vec<Region> {
    Region::ALL.to_vec()
}
fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/news.json")
}
fn default_utc_offset() -> FixedOffset {
    // America/Argentina/Buenos_Aires has no DST.
    FixedOffset::west_opt(3 * 3600).expect("-03:00 is a valid offset")
}

/// Parse "+HH:MM", "-HH:MM", "-03" or "Z".
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (h, m) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&h) || !(0..60).contains(&m) {
        return None;
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

fn deserialize_offset<'de, D: Deserializer<'de>>(d: D) -> Result<FixedOffset, D::Error> {
    let raw = String::deserialize(d)?;
    parse_utc_offset(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid utc_offset `{raw}`")))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectorSettings {
    /// Keep only articles whose title or snippet mention this term.
    #[serde(default)]
    pub require_mention: Option<String>,
    #[serde(default)]
    pub sentiment: SentimentSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub query: String,
    #[serde(default = "default_regions")]
    pub regions: Vec<Region>,
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(
        default = "default_utc_offset",
        deserialize_with = "deserialize_offset"
    )]
    pub utc_offset: FixedOffset,
    /// Write Prometheus text exposition here after each run.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub digest: DigestSettings,
    #[serde(default)]
    pub smtp: SmtpSettings,
}

impl Settings {
    /// Static checks that do not depend on secrets.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            bail!("query must not be empty");
        }
        if self.regions.is_empty() {
            bail!("regions must not be empty");
        }
        if self.digest.max_per_region == 0 {
            bail!("digest.max_per_region must be at least 1");
        }
        let tolerance = self.digest.trigger_tolerance_minutes;
        if !(0..=MAX_TRIGGER_TOLERANCE_MINUTES).contains(&tolerance) {
            bail!(
                "digest.trigger_tolerance_minutes must be within 0..={MAX_TRIGGER_TOLERANCE_MINUTES}"
            );
        }
        self.collector
            .sentiment
            .validate()
            .context("invalid collector.sentiment")?;
        self.digest
            .schedule
            .validate()
            .context("invalid digest.schedule")?;
        Ok(())
    }

    /// Fill "ENV" secrets for the collector.
    pub fn resolve_provider_secrets(&mut self) -> Result<()> {
        if self.provider.kind == ProviderKind::Apify {
            self.provider.token = resolve_env(&self.provider.token, "APIFY_TOKEN")?;
        }
        Ok(())
    }

    /// Fill "ENV" secrets and recipients for the digest sender.
    pub fn resolve_digest_secrets(&mut self) -> Result<()> {
        self.smtp.username = resolve_env(&self.smtp.username, "SMTP_USER")?;
        self.smtp.password = resolve_env(&self.smtp.password, "SMTP_PASS")?;
        if self.digest.recipients.is_empty() {
            let raw = std::env::var("NOTIFY_EMAIL_TO").unwrap_or_default();
            self.digest.recipients = split_recipients(&raw);
        }
        if self.digest.recipients.is_empty() {
            bail!("no digest recipients (set digest.recipients or NOTIFY_EMAIL_TO)");
        }
        Ok(())
    }
}

fn resolve_env(value: &str, var: &str) -> Result<String> {
    if value.trim().eq_ignore_ascii_case(ENV_MARKER) {
        std::env::var(var).map_err(|_| anyhow!("Missing {var} env var"))
    } else {
        Ok(value.to_string())
    }
}

/// "a@x.com, b@y.com,," -> ["a@x.com", "b@y.com"]
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load settings from an explicit path. Supports TOML or JSON, chosen by extension.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let settings = parse_settings(&content, ext.as_str())
        .with_context(|| format!("parsing settings from {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings using env var + fallbacks:
/// 1) $NEWS_DIGEST_CONFIG
/// 2) config/news_digest.toml
/// 3) config/news_digest.json
pub fn load_settings_default() -> Result<Settings> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb);
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb);
        }
    }
    Err(anyhow!(
        "no settings file found ({DEFAULT_TOML_PATH}, {DEFAULT_JSON_PATH} or ${ENV_CONFIG_PATH})"
    ))
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported settings format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::EmptyDigestPolicy;

    #[test]
    fn minimal_toml_gets_defaults() {
        let s = parse_settings(r#"query = "tiktok""#, "toml").unwrap();
        assert_eq!(s.regions, Region::ALL.to_vec());
        assert_eq!(s.utc_offset.local_minus_utc(), -3 * 3600);
        assert_eq!(s.digest.schedule.slots().len(), 3);
        assert_eq!(s.digest.empty_digest, EmptyDigestPolicy::Send);
        assert_eq!(s.provider.kind, ProviderKind::Apify);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn json_is_accepted_without_hint() {
        let s = parse_settings(
            r#"{"query":"tiktok","regions":["ar"],"digest":{"empty_digest":"skip"}}"#,
            "",
        )
        .unwrap();
        assert_eq!(s.regions, vec![Region::Ar]);
        assert_eq!(s.digest.empty_digest, EmptyDigestPolicy::Skip);
    }

    #[test]
    fn utc_offsets_parse() {
        assert_eq!(parse_utc_offset("-03:00").unwrap().local_minus_utc(), -10_800);
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-03").unwrap().local_minus_utc(), -10_800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("03:00").is_none());
        assert!(parse_utc_offset("+25:00").is_none());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut s = parse_settings(r#"query = "tiktok""#, "toml").unwrap();
        s.digest.max_per_region = 0;
        assert!(s.validate().is_err());

        let s = parse_settings("query = \"  \"", "toml").unwrap();
        assert!(s.validate().is_err());

        let s = parse_settings("query = \"x\"\nregions = []", "toml").unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn huge_schedule_values_are_rejected_not_panicking() {
        let toml = r#"
query = "tiktok"

[digest]
trigger_tolerance_minutes = 9223372036854775807
"#;
        let s = parse_settings(toml, "toml").unwrap();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("trigger_tolerance_minutes"));

        let toml = r#"
query = "tiktok"

[[digest.schedule]]
at = "08:00"
start = "18:00"
start_day_offset = -1000000000
end = "08:00"
"#;
        let s = parse_settings(toml, "toml").unwrap();
        let err = s.validate().unwrap_err();
        assert!(format!("{err:#}").contains("day offset -1000000000"));
    }

    #[test]
    fn lexicon_sentiment_section_is_read_and_checked() {
        let toml = r#"
query = "tiktok"

[collector.sentiment]
kind = "lexicon"
positive = ["lanza"]
negative = ["multa"]
"#;
        let s = parse_settings(toml, "toml").unwrap();
        assert_eq!(s.collector.sentiment.positive, vec!["lanza".to_string()]);
        assert!(s.validate().is_ok());

        let s = parse_settings(
            "query = \"tiktok\"\n[collector.sentiment]\nkind = \"lexicon\"",
            "toml",
        )
        .unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn recipients_split_and_trim() {
        assert_eq!(
            split_recipients(" a@x.com, b@y.com,, "),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
    }
}
