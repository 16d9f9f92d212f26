// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod record;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{CollectorError, DigestError, StoreError};
pub use crate::ingest::{run_once, CollectOptions, CollectorReport};
pub use crate::record::{Dataset, Published, Record, Region, Sentiment};
