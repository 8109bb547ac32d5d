//! Landing page fetcher with retry/backoff.

use tracing::{info, instrument};

use super::client::HttpClient;
use super::error::{DownloadError, FetchError};
use super::retry::{FailureType, RetryPolicy};

/// Fetches landing page HTML, retrying transient failures.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: HttpClient,
    retry_policy: RetryPolicy,
}

impl PageFetcher {
    /// Creates a fetcher that shares `client` and follows `retry_policy`.
    #[must_use]
    pub fn new(client: HttpClient, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    /// Fetches `url`, returning its body text.
    ///
    /// Every failure counts as an attempt, including a malformed URL.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once the retry policy gives up. Callers treat it
    /// as fatal for this page only.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let client = &self.client;
        let outcome = self
            .retry_policy
            .execute(
                "page fetch",
                url,
                move |_| client.fetch_text(url),
                |_: &DownloadError| FailureType::Transient,
            )
            .await;

        match outcome {
            Ok(fetched) => {
                info!(
                    bytes = fetched.value.len(),
                    attempts = fetched.attempts,
                    "page fetched"
                );
                Ok(fetched.value)
            }
            Err(exhausted) => Err(FetchError {
                url: url.to_string(),
                attempts: exhausted.attempts,
                source: exhausted.error,
            }),
        }
    }
}
