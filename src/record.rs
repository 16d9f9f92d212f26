//! Record schema and the link-deduplicated dataset shared by both jobs.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Tracked country. Scopes both the provider query and the digest grouping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Ar,
    Cl,
    Pe,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Ar, Region::Cl, Region::Pe];

    /// Lowercase ISO 3166-1 alpha-2 code, as stored on disk.
    pub fn code(self) -> &'static str {
        match self {
            Region::Ar => "ar",
            Region::Cl => "cl",
            Region::Pe => "pe",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::Ar => "Argentina",
            Region::Cl => "Chile",
            Region::Pe => "Peru",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" | "argentina" => Ok(Region::Ar),
            "cl" | "chile" => Ok(Region::Cl),
            "pe" | "peru" => Ok(Region::Pe),
            other => anyhow::bail!("unknown region: {other}"),
        }
    }
}

/// Publication time as the provider reported it. Some sources only give a calendar
/// date; that date is kept as-is instead of being pinned to an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Published {
    At(DateTime<Utc>),
    Date(NaiveDate),
}

impl Published {
    /// Calendar date as seen from `offset`. Bare dates never shift.
    pub fn local_date(self, offset: FixedOffset) -> NaiveDate {
        match self {
            Published::At(t) => t.with_timezone(&offset).date_naive(),
            Published::Date(d) => d,
        }
    }
}

/// Tone of an article towards the tracked query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn label(self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Negative => "NEGATIVE",
        }
    }
}

/// One ingested article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub link: String, // canonical, dedup key
    pub title: String,
    pub source: String,
    pub region: Region,
    #[serde(default)]
    pub published_at: Option<Published>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// Insertion-ordered records with unique links. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<Record>,
    links: HashSet<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows. Rows repeating an earlier link are dropped.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut ds = Self::new();
        ds.merge(records);
        ds
    }

    /// Append every candidate whose link is not yet present, first occurrence wins.
    /// Returns the records that were actually appended, in order.
    pub fn merge(&mut self, candidates: Vec<Record>) -> Vec<Record> {
        let mut appended = Vec::new();
        for rec in candidates {
            if self.links.insert(rec.link.clone()) {
                appended.push(rec.clone());
                self.records.push(rec);
            }
        }
        appended
    }

    pub fn contains_link(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
