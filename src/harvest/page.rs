//! One source page: fetch, extract, download.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::stats::RunStatistics;
use crate::download::{PageFetcher, RetryPolicy, Transferrer, classify_error};
use crate::extract::LinkExtractor;

/// How a page run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageStatus {
    /// Every extracted URL was attempted.
    Completed,
    /// The page itself could not be fetched.
    FetchFailed {
        /// Last fetch error.
        reason: String,
    },
    /// The page had no qualifying media URLs.
    NoMedia,
    /// An interrupt stopped the page before all URLs were attempted.
    Interrupted,
}

/// Final state of one media URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemResult {
    /// A verified file is on disk.
    Saved {
        /// Final path.
        path: PathBuf,
        /// Size in bytes.
        bytes: u64,
        /// An existing file was reused.
        reused: bool,
    },
    /// Every attempt failed.
    Failed {
        /// Error category (`network`, `filesystem`, ...).
        category: String,
        /// Last error message.
        reason: String,
    },
}

/// One media URL and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    /// The media URL.
    pub url: String,
    /// Attempts made, including the last one.
    pub attempts: u32,
    /// Result after the last attempt.
    pub result: ItemResult,
}

impl ItemOutcome {
    /// True when the item produced a file.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self.result, ItemResult::Saved { .. })
    }
}

/// Everything a page run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    /// Source page URL.
    pub url: String,
    /// Terminal status.
    pub status: PageStatus,
    /// Counters for this page.
    pub stats: RunStatistics,
    /// Outcomes in lexicographic URL order.
    pub items: Vec<ItemOutcome>,
}

impl PageReport {
    fn empty(url: &str, status: PageStatus) -> Self {
        Self {
            url: url.to_string(),
            status,
            stats: RunStatistics::default(),
            items: Vec::new(),
        }
    }
}

enum PageState {
    Fetching,
    Extracting(String),
    Downloading(BTreeSet<String>),
    Done(PageReport),
}

/// Drives a single page through fetch, extract and download.
#[derive(Clone)]
pub struct PageRunner {
    fetcher: PageFetcher,
    extractor: Arc<dyn LinkExtractor>,
    transferrer: Transferrer,
    retry_policy: RetryPolicy,
    output_dir: PathBuf,
    concurrency: usize,
    interrupted: Arc<AtomicBool>,
}

impl std::fmt::Debug for PageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRunner")
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl PageRunner {
    /// Creates a runner writing into `output_dir`.
    ///
    /// `concurrency` is clamped to at least 1; `interrupted` is polled
    /// before every item.
    #[must_use]
    pub fn new(
        fetcher: PageFetcher,
        extractor: Arc<dyn LinkExtractor>,
        transferrer: Transferrer,
        retry_policy: RetryPolicy,
        output_dir: PathBuf,
        concurrency: usize,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            transferrer,
            retry_policy,
            output_dir,
            concurrency: concurrency.max(1),
            interrupted,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Runs the page and returns its report. Never fails: every problem
    /// ends up in the report.
    #[instrument(skip(self), fields(page = %page_url))]
    pub async fn run(&self, page_url: &str) -> PageReport {
        let mut state = PageState::Fetching;
        loop {
            state = match state {
                PageState::Fetching => match self.fetcher.fetch(page_url).await {
                    Ok(html) => PageState::Extracting(html),
                    Err(e) => {
                        error!(error = %e, "Could not fetch the start page");
                        PageState::Done(PageReport::empty(
                            page_url,
                            PageStatus::FetchFailed {
                                reason: e.to_string(),
                            },
                        ))
                    }
                },
                PageState::Extracting(html) => {
                    let urls = self.extractor.extract(&html);
                    if urls.is_empty() {
                        warn!("No video URLs found");
                        PageState::Done(PageReport::empty(page_url, PageStatus::NoMedia))
                    } else {
                        PageState::Downloading(urls)
                    }
                }
                PageState::Downloading(urls) => {
                    PageState::Done(self.download_all(page_url, urls).await)
                }
                PageState::Done(report) => return report,
            };
        }
    }

    async fn download_all(&self, page_url: &str, urls: BTreeSet<String>) -> PageReport {
        let total = urls.len();
        info!(
            total,
            output_dir = %self.output_dir.display(),
            "Starting download of {total} videos"
        );

        let outcomes: Vec<Option<ItemOutcome>> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                if self.is_interrupted() {
                    return None;
                }
                info!("[{}/{total}] Processing: {url}", index + 1);
                Some(self.download_with_retry(url).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut stats = RunStatistics::with_found(total);
        let mut items = Vec::with_capacity(total);
        for outcome in outcomes.into_iter().flatten() {
            match &outcome.result {
                ItemResult::Saved { reused, .. } => {
                    stats.downloaded += 1;
                    if *reused {
                        stats.reused += 1;
                    }
                }
                ItemResult::Failed { .. } => stats.failed.push(outcome.url.clone()),
            }
            items.push(outcome);
        }

        let status = if items.len() < total {
            warn!(attempted = items.len(), total, "page interrupted");
            PageStatus::Interrupted
        } else {
            PageStatus::Completed
        };

        PageReport {
            url: page_url.to_string(),
            status,
            stats,
            items,
        }
    }

    /// Attempts one media URL under the retry policy.
    async fn download_with_retry(&self, url: &str) -> ItemOutcome {
        let transferrer = &self.transferrer;
        let output_dir = self.output_dir.as_path();
        let outcome = self
            .retry_policy
            .execute(
                "download",
                url,
                move |_| transferrer.download(url, output_dir),
                classify_error,
            )
            .await;

        match outcome {
            Ok(done) => ItemOutcome {
                url: url.to_string(),
                attempts: done.attempts,
                result: ItemResult::Saved {
                    path: done.value.path,
                    bytes: done.value.bytes,
                    reused: done.value.reused,
                },
            },
            Err(exhausted) => {
                error!(
                    url,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "FAILED: Could not download {url} after {} attempts",
                    exhausted.attempts
                );
                ItemOutcome {
                    url: url.to_string(),
                    attempts: exhausted.attempts,
                    result: ItemResult::Failed {
                        category: exhausted.error.category().to_string(),
                        reason: exhausted.error.to_string(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::download::{HttpClient, NoProgress};
    use crate::extract::DropdownExtractor;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner(dir: &TempDir, interrupted: Arc<AtomicBool>, concurrency: usize) -> PageRunner {
        let client = HttpClient::new();
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 2.0);
        PageRunner::new(
            PageFetcher::new(client.clone(), policy.clone()),
            Arc::new(DropdownExtractor::with_defaults()),
            Transferrer::new(client, Arc::new(NoProgress)),
            policy,
            dir.path().to_path_buf(),
            concurrency,
            interrupted,
        )
    }

    fn page_html(server: &MockServer, names: &[&str]) -> String {
        let links: String = names
            .iter()
            .map(|n| format!("<a onclick=\"myfunction('{}/v/{n}')\">get</a>\n", server.uri()))
            .collect();
        format!("<div class=\"dropdown-content\">{links}</div>")
    }

    async fn mount_video(server: &MockServer, name: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/v/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_page_downloads_every_url() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_html(&server, &["b-clip-1-2.mp4", "a-clip-3-4.mp4"])),
            )
            .mount(&server)
            .await;
        mount_video(&server, "a-clip-3-4.mp4", b"aaaa").await;
        mount_video(&server, "b-clip-1-2.mp4", b"bb").await;

        let report = runner(&dir, Arc::new(AtomicBool::new(false)), 1)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        assert_eq!(report.status, PageStatus::Completed);
        assert_eq!(report.stats.found, 2);
        assert_eq!(report.stats.downloaded, 2);
        assert!(report.items[0].url.ends_with("a-clip-3-4.mp4"));
        assert!(dir.path().join("a clip.mp4").exists());
        assert!(dir.path().join("b clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_transfer_fails_twice_then_succeeds() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(page_html(&server, &["flaky.mp4"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/flaky.mp4"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_video(&server, "flaky.mp4", b"finally").await;

        let report = runner(&dir, Arc::new(AtomicBool::new(false)), 1)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        assert_eq!(report.stats.downloaded, 1);
        assert!(report.stats.failed.is_empty());
        assert_eq!(report.items[0].attempts, 3);
        assert!(report.items[0].is_saved());
    }

    #[tokio::test]
    async fn test_exhausted_item_is_recorded_as_failed() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_html(&server, &["dead.mp4", "ok.mp4"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/dead.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;
        mount_video(&server, "ok.mp4", b"ok").await;

        let report = runner(&dir, Arc::new(AtomicBool::new(false)), 1)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        assert_eq!(report.status, PageStatus::Completed);
        assert_eq!(report.stats.downloaded, 1);
        assert_eq!(report.stats.failed, vec![format!("{}/v/dead.mp4", server.uri())]);
        match &report.items[0].result {
            ItemResult::Failed { category, .. } => assert_eq!(category, "network"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_page_without_media_is_no_media() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let report = runner(&dir, Arc::new(AtomicBool::new(false)), 1)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        assert_eq!(report.status, PageStatus::NoMedia);
        assert_eq!(report.stats, RunStatistics::default());
    }

    #[tokio::test]
    async fn test_interrupt_before_items_skips_them() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(page_html(&server, &["x.mp4"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/x.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let report = runner(&dir, Arc::new(AtomicBool::new(true)), 1)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        assert_eq!(report.status, PageStatus::Interrupted);
        assert_eq!(report.stats.found, 1);
        assert!(report.items.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_lexicographic_order() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let names = ["c.mp4", "a.mp4", "b.mp4", "d.mp4"];
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_html(&server, &names)))
            .mount(&server)
            .await;
        for name in names {
            mount_video(&server, name, name.as_bytes()).await;
        }

        let report = runner(&dir, Arc::new(AtomicBool::new(false)), 3)
            .run(&format!("{}/gallery", server.uri()))
            .await;

        let order: Vec<_> = report
            .items
            .iter()
            .map(|i| i.url.rsplit('/').next().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        assert_eq!(report.stats.downloaded, 4);
    }
}
