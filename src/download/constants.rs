//! Constants for the download module (timeouts, chunking, progress cadence).

/// Timeout for fetching a landing page (30 seconds).
pub const PAGE_TIMEOUT_SECS: u64 = 30;

/// Timeout for the best-effort HEAD size check (30 seconds).
pub const HEAD_TIMEOUT_SECS: u64 = 30;

/// Timeout for a streaming media download (60 seconds).
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Maximum number of bytes written per chunk (8 KiB).
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Minimum percentage-point advance between progress updates when size is known.
pub const PROGRESS_STEP_PERCENT: f64 = 5.0;

/// Byte interval between progress updates when size is unknown (50 MiB).
pub const UNKNOWN_SIZE_PROGRESS_INTERVAL: u64 = 50 * 1024 * 1024;

/// Media extension that qualifies an extracted URL.
pub const MEDIA_EXTENSION: &str = ".mp4";

/// Suffix used for in-flight downloads before size verification.
pub const PARTIAL_SUFFIX: &str = ".part";
