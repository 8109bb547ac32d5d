//! HTTP client wrapper for page fetches, size checks and media streams.
//!
//! This module provides the `HttpClient` struct which owns one pooled
//! reqwest client configured with the browser User-Agent and the per-request
//! timeouts the rest of the crate relies on.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, instrument};

use super::constants::{DOWNLOAD_TIMEOUT_SECS, HEAD_TIMEOUT_SECS, PAGE_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent::resolve_user_agent;

/// Timeouts and identification used to build an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// User-Agent header value.
    pub user_agent: String,
    /// Total deadline for a landing page GET.
    pub page_timeout: Duration,
    /// Total deadline for the HEAD size check.
    pub head_timeout: Duration,
    /// Idle-read deadline while streaming a media body.
    pub download_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: resolve_user_agent(None),
            page_timeout: Duration::from_secs(PAGE_TIMEOUT_SECS),
            head_timeout: Duration::from_secs(HEAD_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

/// HTTP client for landing pages and media files.
///
/// This client is designed to be created once and reused for every request
/// in a run, taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use reelfetch_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let html = client.fetch_text("https://example.com/App/me/collection/").await?;
/// println!("{} bytes of HTML", html.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    page_timeout: Duration,
    head_timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_settings(&ClientSettings::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client from explicit settings.
    ///
    /// The download timeout is applied as an idle-read timeout so large files
    /// are not cut off by a total deadline.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(settings), fields(user_agent = %settings.user_agent))]
    pub fn with_settings(settings: &ClientSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(settings.page_timeout)
            .read_timeout(settings.download_timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            page_timeout: settings.page_timeout,
            head_timeout: settings.head_timeout,
        })
    }

    /// Fetches a page body as text with a single GET.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` for transport failures, timeouts and non-2xx statuses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self
            .send_request("GET", url, Some(self.page_timeout))
            .await?;
        response.text().await.map_err(|e| map_reqwest_error(url, e))
    }

    /// Asks the server for the resource size without downloading it.
    ///
    /// Best effort: any failure or a missing/invalid `Content-Length` yields `None`.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn content_length(&self, url: &str) -> Option<u64> {
        let response = match self
            .send_request("HEAD", url, Some(self.head_timeout))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "size check failed, continuing with unknown size");
                return None;
            }
        };

        // Read the header directly: `Response::content_length` reports the
        // (empty) body of a HEAD response.
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        debug!(size = ?size, "size check complete");
        size
    }

    /// Opens a streaming GET for a media file.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` for transport failures, timeouts and non-2xx statuses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn open_stream(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        self.send_request("GET", url, None).await
    }

    async fn send_request(
        &self,
        method: &str,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut request = match method {
            "HEAD" => self.client.head(url),
            _ => self.client.get(url),
        };
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }
}

/// Maps a reqwest error onto the crate error, separating timeouts and bad URLs.
pub(crate) fn map_reqwest_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else if error.is_builder() {
        DownloadError::invalid_url(url)
    } else {
        DownloadError::network(url, error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_client_settings_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.page_timeout, Duration::from_secs(30));
        assert_eq!(settings.head_timeout, Duration::from_secs(30));
        assert_eq!(settings.download_timeout, Duration::from_secs(60));
        assert!(settings.user_agent.starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_fetch_text_sends_browser_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/gallery"))
            .and(header("user-agent", crate::user_agent::BROWSER_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let body = client
            .fetch_text(&format!("{}/gallery", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");
    }

    #[tokio::test]
    async fn test_fetch_text_maps_error_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let result = client
            .fetch_text(&format!("{}/missing", mock_server.uri()))
            .await;
        match result {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_content_length_reads_head_header() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 1234]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let size = client
            .content_length(&format!("{}/clip.mp4", mock_server.uri()))
            .await;
        assert_eq!(size, Some(1234));
    }

    #[tokio::test]
    async fn test_content_length_is_none_when_head_fails() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let size = client
            .content_length(&format!("{}/clip.mp4", mock_server.uri()))
            .await;
        assert_eq!(size, None);
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let client = HttpClient::new();
        let result = client.fetch_text("not a url").await;
        assert!(
            matches!(result, Err(DownloadError::InvalidUrl { .. })),
            "got: {result:?}"
        );
    }
}
