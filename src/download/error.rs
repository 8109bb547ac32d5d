//! Error types for the download module.
//!
//! This module defines structured errors for page fetches and media transfers,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a page or transferring a media file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while creating, writing, renaming, or deleting a file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Downloaded file size does not match the size reported by the server.
    #[error("size mismatch for {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    SizeMismatch {
        /// Path of the (deleted) partial file.
        path: PathBuf,
        /// Size announced by the HEAD request.
        expected_bytes: u64,
        /// Size found on disk after streaming.
        actual_bytes: u64,
    },

    /// Every candidate name `name (n).ext` is already taken by a different file.
    #[error("no free filename for {name} in {dir}")]
    NamesExhausted {
        /// Output directory that was searched.
        dir: PathBuf,
        /// Cleaned base filename.
        name: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a size mismatch error.
    pub fn size_mismatch(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::SizeMismatch {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a names-exhausted error.
    pub fn names_exhausted(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::NamesExhausted {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Short label for the failure family, used in logs and reports.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => "network",
            Self::Io { .. } | Self::NamesExhausted { .. } => "filesystem",
            Self::SizeMismatch { .. } => "size-mismatch",
            Self::InvalidUrl { .. } => "invalid-url",
        }
    }
}

/// A landing page could not be fetched after all attempts.
#[derive(Debug, Error)]
#[error("failed to fetch page {url} after {attempts} attempts: {source}")]
pub struct FetchError {
    /// The page URL.
    pub url: String,
    /// How many attempts were made.
    pub attempts: u32,
    /// The error from the final attempt.
    #[source]
    pub source: DownloadError,
}

// No `From<reqwest::Error>` / `From<std::io::Error>` impls: every variant needs
// the url or path that the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/clip.mp4");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/clip.mp4"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/clip.mp4", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://example.com/clip.mp4"));
    }

    #[test]
    fn test_download_error_size_mismatch_display() {
        let error = DownloadError::size_mismatch("/tmp/clip.mp4", 100, 10);
        let msg = error.to_string();
        assert!(msg.contains("expected 100 bytes"), "got: {msg}");
        assert!(msg.contains("got 10"), "got: {msg}");
    }

    #[test]
    fn test_download_error_categories() {
        assert_eq!(DownloadError::timeout("u").category(), "network");
        assert_eq!(DownloadError::http_status("u", 404).category(), "network");
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(DownloadError::io("/x", io).category(), "filesystem");
        assert_eq!(DownloadError::names_exhausted("/x", "a.mp4").category(), "filesystem");
        assert_eq!(
            DownloadError::size_mismatch("/x", 1, 2).category(),
            "size-mismatch"
        );
        assert_eq!(DownloadError::invalid_url("nope").category(), "invalid-url");
    }

    #[test]
    fn test_fetch_error_display_includes_attempts() {
        let error = FetchError {
            url: "https://example.com/gallery".to_string(),
            attempts: 3,
            source: DownloadError::http_status("https://example.com/gallery", 500),
        };
        let msg = error.to_string();
        assert!(msg.contains("after 3 attempts"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }
}
