// src/digest/schedule.rs
//! Slot table and window resolution. All wall-clock times are local to a fixed UTC
//! offset; windows are resolved to absolute UTC instants so that comparisons never mix
//! up days.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

use crate::error::ScheduleError;

/// Largest distance, in days, between a trigger date and either window bound.
pub const MAX_DAY_OFFSET: i64 = 7;

mod hhmm {
    use super::*;

    pub fn parse(s: &str) -> Option<NaiveTime> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time `{raw}`, want HH:MM")))
    }
}

/// One trigger time and the window it reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Local time the digest is triggered.
    #[serde(with = "hhmm")]
    pub at: NaiveTime,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Days relative to the trigger date, e.g. -1 for "previous day 18:00".
    #[serde(default)]
    pub start_day_offset: i64,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default)]
    pub end_day_offset: i64,
    /// Human label for the subject line; derived from the bounds when absent.
    #[serde(default)]
    pub label: Option<String>,
}

impl Slot {
    pub fn new(
        at: &str,
        start: &str,
        start_day_offset: i64,
        end: &str,
    ) -> Result<Self, ScheduleError> {
        let t = |s: &str| {
            hhmm::parse(s).ok_or_else(|| ScheduleError::InvalidTime {
                value: s.to_string(),
            })
        };
        Ok(Self {
            at: t(at)?,
            start: t(start)?,
            start_day_offset,
            end: t(end)?,
            end_day_offset: 0,
            label: None,
        })
    }

    fn offsets_in_range(&self) -> bool {
        let range = -MAX_DAY_OFFSET..=MAX_DAY_OFFSET;
        range.contains(&self.start_day_offset) && range.contains(&self.end_day_offset)
    }

    fn local_bounds(&self, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let shift = |days: i64| {
            Duration::try_days(days).and_then(|d| date.checked_add_signed(d))
        };
        Some((
            shift(self.start_day_offset)?.and_time(self.start),
            shift(self.end_day_offset)?.and_time(self.end),
        ))
    }

    fn bounds_on(
        &self,
        date: NaiveDate,
        offset: FixedOffset,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (start, end) = self.local_bounds(date)?;
        Some((to_utc(start, offset), to_utc(end, offset)))
    }
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Half-open `[start, end)` interval over `captured_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl Window {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(pub Vec<Slot>);

impl Schedule {
    /// Three digests a day: 08:00, 13:00 and 18:00.
    pub fn three_slot_day() -> Self {
        let slot = |at, start, day, end| {
            Slot::new(at, start, day, end).expect("static slot table is well formed")
        };
        Self(vec![
            slot("08:00", "18:00", -1, "08:00"),
            slot("13:00", "08:00", 0, "13:00"),
            slot("18:00", "13:00", 0, "18:00"),
        ])
    }

    pub fn slots(&self) -> &[Slot] {
        &self.0
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.0.is_empty() {
            return Err(ScheduleError::Empty);
        }
        let mut seen = HashSet::new();
        let any_day = NaiveDate::default();
        for slot in &self.0 {
            let at = slot.at.format("%H:%M").to_string();
            if !seen.insert(slot.at) {
                return Err(ScheduleError::DuplicateSlot { at });
            }
            let range = -MAX_DAY_OFFSET..=MAX_DAY_OFFSET;
            if let Some(&offset) = [slot.start_day_offset, slot.end_day_offset]
                .iter()
                .find(|o| !range.contains(*o))
            {
                return Err(ScheduleError::DayOffsetOutOfRange { at, offset });
            }
            match slot.local_bounds(any_day) {
                Some((s, e)) if s < e => {}
                _ => return Err(ScheduleError::EmptyWindow { at }),
            }
        }
        Ok(())
    }

    /// Find the slot whose trigger boundary lies within `tolerance` of `now` (checking
    /// the local day of `now` and both neighbours) and return its window. The nearest
    /// boundary wins when several qualify. Slots with out-of-range day offsets never match.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        offset: FixedOffset,
        tolerance: Duration,
    ) -> Option<Window> {
        let today = now.with_timezone(&offset).date_naive();
        let mut best: Option<(Duration, &Slot, NaiveDate)> = None;

        for slot in self.0.iter().filter(|s| s.offsets_in_range()) {
            for delta in [-1i64, 0, 1] {
                let Some(date) = today.checked_add_signed(Duration::days(delta)) else {
                    continue;
                };
                let boundary = to_utc(date.and_time(slot.at), offset);
                let distance = if now >= boundary {
                    now - boundary
                } else {
                    boundary - now
                };
                if distance > tolerance {
                    continue;
                }
                let closer = match &best {
                    None => true,
                    Some((d, _, _)) => distance < *d,
                };
                if closer {
                    best = Some((distance, slot, date));
                }
            }
        }

        let (_, slot, date) = best?;
        let (start, end) = slot.bounds_on(date, offset)?;
        let label = slot
            .label
            .clone()
            .unwrap_or_else(|| format_bounds(start, end, offset));
        Some(Window { start, end, label })
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::three_slot_day()
    }
}

/// "16/10/2025 18:00 - 17/10/2025 08:00" in local time.
pub fn format_bounds(start: DateTime<Utc>, end: DateTime<Utc>, offset: FixedOffset) -> String {
    let fmt = "%d/%m/%Y %H:%M";
    format!(
        "{} - {}",
        start.with_timezone(&offset).format(fmt),
        end.with_timezone(&offset).format(fmt)
    )
}
