// src/error.rs
//! Error taxonomy for both jobs. Per-region provider failures are not errors at this
//! level; they are absorbed into `CollectorReport::failures`.

use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;
use thiserror::Error;

use crate::record::Region;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading dataset {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding dataset {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding dataset: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("writing dataset {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the error happened before anything was merged (existing data unreadable).
    pub fn is_read_side(&self) -> bool {
        matches!(self, StoreError::Read { .. } | StoreError::Decode { .. })
    }
}

/// One region whose provider call failed during a collector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: Region,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("provider call failed for every region ({} failures)", failures.len())]
    AllProvidersFailed { failures: Vec<RegionFailure> },
    #[error("existing dataset could not be read")]
    DatasetUnreadable(#[source] StoreError),
    #[error("persisting dataset failed")]
    PersistenceWriteFailed(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("no schedule slot matches {at}")]
    NoMatchingSlot { at: DateTime<FixedOffset> },
    #[error("sending digest failed: {0:#}")]
    TransportFailed(anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule is empty")]
    Empty,
    #[error("slot {at}: window start is not before window end")]
    EmptyWindow { at: String },
    #[error("slot {at} is configured more than once")]
    DuplicateSlot { at: String },
    #[error("slot {at}: day offset {offset} is outside -7..=7")]
    DayOffsetOutOfRange { at: String, offset: i64 },
    #[error("invalid time `{value}`, want HH:MM")]
    InvalidTime { value: String },
}
