//! Reelfetch Core Library
//!
//! Harvests `.mp4` files linked from collection landing pages. Each page is
//! fetched, its dropdown menus are scanned for embedded media links, and
//! every link is streamed to disk under a cleaned, collision-free name with
//! size verification.
//!
//! # Architecture
//!
//! - [`download`] - HTTP client, page fetcher, retry policy, naming and
//!   streaming transfer
//! - [`extract`] - Media link extraction from landing page HTML
//! - [`harvest`] - Per-page state machine, run aggregation and the final report

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod extract;
pub mod harvest;
#[cfg(test)]
pub mod test_support;
pub mod user_agent;

// Re-export commonly used types
pub use download::{
    ClientSettings, DEFAULT_MAX_RETRIES, DownloadError, FetchError, HttpClient, LogProgress,
    NoProgress, PageFetcher, ProgressReporter, ProgressUpdate, RetryPolicy, Transferrer,
    clean_name, group_thousands,
};
pub use extract::{DropdownExtractor, ExtractorConfig, LinkExtractor};
pub use harvest::{
    DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_DIR, FinalReport, HarvestConfig, HarvestError, Harvester,
    MAX_CONCURRENCY, PageReport, PageStatus, RunStatistics, split_source_urls,
};
pub use user_agent::{BROWSER_USER_AGENT, resolve_user_agent};
