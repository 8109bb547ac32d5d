//! HTTP fetching and streaming media transfer.
//!
//! This module owns everything that touches the network or the output
//! directory for a single URL:
//!
//! - [`PageFetcher`] GETs a landing page with retry/backoff
//! - [`Transferrer`] streams one media file to disk with size verification
//! - [`clean_name`] / [`resolve_collision`] decide where a file lands
//! - [`ProgressTracker`] throttles progress samples for a [`ProgressReporter`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use reelfetch_core::download::{HttpClient, LogProgress, Transferrer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transferrer = Transferrer::new(HttpClient::new(), Arc::new(LogProgress));
//! let done = transferrer
//!     .download("https://cdn.example.com/v/movie-title-1652393410-9.mp4", Path::new("mediafiles"))
//!     .await?;
//! println!("Saved: {}", done.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod fetcher;
mod filename;
mod progress;
mod retry;
mod transfer;

pub use client::{ClientSettings, HttpClient};
pub use error::{DownloadError, FetchError};
pub use fetcher::PageFetcher;
pub use filename::{NamePlan, clean_name, filename_from_url, resolve_collision};
pub use progress::{
    LogProgress, NoProgress, ProgressReporter, ProgressTracker, ProgressUpdate, group_thousands,
};
pub use retry::{
    Attempted, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryExhausted, RetryPolicy,
    classify_error,
};
pub use transfer::{Transferred, Transferrer, partial_path_for};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
