//! Multi-page harvesting: runs every source page and folds the results.
//!
//! - [`PageRunner`] drives one page through `Fetching → Extracting →
//!   Downloading → Done`
//! - [`Harvester`] runs the pages one after another, never stopping on a
//!   page failure, and builds the [`FinalReport`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use reelfetch_core::download::LogProgress;
//! use reelfetch_core::harvest::{HarvestConfig, Harvester, split_source_urls};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvestConfig::default();
//! let harvester = Harvester::new(&config, Arc::new(LogProgress), Arc::new(AtomicBool::new(false)))?;
//! let urls = split_source_urls("https://example.com/App/me/a/;https://example.com/App/me/b/");
//! let report = harvester.run(&urls).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod page;
mod report;
mod stats;

pub use page::{ItemOutcome, ItemResult, PageReport, PageRunner, PageStatus};
pub use report::{FileEntry, FinalReport, list_media_files};
pub use stats::RunStatistics;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::download::{
    ClientSettings, DEFAULT_MAX_RETRIES, HttpClient, PageFetcher, ProgressReporter, RetryPolicy,
    Transferrer,
};
use crate::extract::{DropdownExtractor, ExtractorConfig, LinkExtractor};

/// Output directory used when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "mediafiles";

/// Default number of in-flight transfers per page.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound for in-flight transfers per page.
pub const MAX_CONCURRENCY: usize = 16;

/// Everything needed to build a [`Harvester`].
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Directory receiving media files; created if absent.
    pub output_dir: PathBuf,
    /// In-flight transfers per page (1 = sequential).
    pub concurrency: usize,
    /// Attempts per page fetch and per media URL.
    pub max_retries: u32,
    /// Delay after the first failed attempt; doubles each retry.
    pub retry_base_delay: Duration,
    /// HTTP identification and timeouts.
    pub client: ClientSettings,
    /// Link extraction patterns.
    pub extractor: ExtractorConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
            client: ClientSettings::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl HarvestConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries.max(1),
            self.retry_base_delay,
            Duration::from_secs(32),
            2.0,
        )
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// An extraction pattern did not compile.
    #[error("invalid extraction pattern: {0}")]
    Extractor(#[source] regex::Error),

    /// The output directory could not be created or read.
    #[error("output directory {path}: {source}")]
    OutputDir {
        /// The directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs every source page in order and produces the final report.
#[derive(Debug, Clone)]
pub struct Harvester {
    runner: PageRunner,
    output_dir: PathBuf,
    interrupted: Arc<AtomicBool>,
}

impl Harvester {
    /// Builds a harvester from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if the HTTP client or extraction patterns
    /// cannot be built.
    pub fn new(
        config: &HarvestConfig,
        reporter: Arc<dyn ProgressReporter>,
        interrupted: Arc<AtomicBool>,
    ) -> Result<Self, HarvestError> {
        let client = HttpClient::with_settings(&config.client).map_err(HarvestError::Client)?;
        let extractor: Arc<dyn LinkExtractor> =
            Arc::new(DropdownExtractor::new(&config.extractor).map_err(HarvestError::Extractor)?);
        let policy = config.retry_policy();

        let runner = PageRunner::new(
            PageFetcher::new(client.clone(), policy.clone()),
            extractor,
            Transferrer::new(client, reporter),
            policy,
            config.output_dir.clone(),
            config.concurrency.clamp(1, MAX_CONCURRENCY),
            Arc::clone(&interrupted),
        );

        Ok(Self {
            runner,
            output_dir: config.output_dir.clone(),
            interrupted,
        })
    }

    /// Runs `urls` sequentially and returns the consolidated report.
    ///
    /// Page failures are recorded, never propagated. Once an interrupt is
    /// observed no further page is started.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::OutputDir`] if the output directory cannot be
    /// created or listed.
    #[instrument(skip(self, urls), fields(pages = urls.len(), output_dir = %self.output_dir.display()))]
    pub async fn run(&self, urls: &[String]) -> Result<FinalReport, HarvestError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| HarvestError::OutputDir {
                path: self.output_dir.clone(),
                source,
            })?;

        info!("Processing {} gallery URL(s)", urls.len());

        let mut pages = Vec::with_capacity(urls.len());
        let mut interrupted = false;
        for (index, url) in urls.iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                warn!(remaining = urls.len() - index, "interrupt received, stopping");
                interrupted = true;
                break;
            }
            info!("GALLERY {}/{}: {url}", index + 1, urls.len());
            let report = self.runner.run(url).await;
            if report.status == PageStatus::Interrupted {
                interrupted = true;
            }
            pages.push(report);
        }
        interrupted |= self.interrupted.load(Ordering::SeqCst);

        FinalReport::build(pages, &self.output_dir, interrupted).map_err(|source| {
            HarvestError::OutputDir {
                path: self.output_dir.clone(),
                source,
            }
        })
    }
}

/// Splits `;`-separated source URLs, trimming entries and dropping empties.
///
/// ```
/// use reelfetch_core::harvest::split_source_urls;
///
/// assert_eq!(split_source_urls(" a ; ;b"), vec!["a", "b"]);
/// ```
#[must_use]
pub fn split_source_urls(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
