//! Transfer progress tracking with throttled reporting.
//!
//! [`ProgressTracker`] decides *when* an update is worth emitting; a
//! [`ProgressReporter`] decides *how* it is shown. With a known size an update
//! is emitted each time progress advances by at least five percentage points
//! and once on completion. With an unknown size an update is emitted for the
//! first chunk and then every time another 50 MiB boundary is crossed.

use std::time::{Duration, Instant};

use tracing::info;

use super::constants::{PROGRESS_STEP_PERCENT, UNKNOWN_SIZE_PROGRESS_INTERVAL};

const BAR_WIDTH: usize = 30;
const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// One emitted progress sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Bytes written so far.
    pub downloaded: u64,
    /// Expected total, when the server announced one.
    pub total: Option<u64>,
    /// Time since the transfer started.
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Percentage complete, when the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        self.total
            .map(|total| self.downloaded as f64 * 100.0 / total as f64)
    }

    /// Throughput in Mbit/s (bits per second / 1024²), once any time has elapsed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mbits_per_sec(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.downloaded as f64 * 8.0 / secs / MIB)
    }

    /// Human-readable rate, or `calculating...` before any time has elapsed.
    #[must_use]
    pub fn rate_label(&self) -> String {
        self.mbits_per_sec()
            .map_or_else(|| "calculating...".to_string(), |rate| format!("{rate:.1} Mbit/s"))
    }

    /// Renders a single progress line.
    ///
    /// Known size: `[██████░░░…] 20.0% (2.0/10.0 MB) @ 8.0 Mbit/s`.
    /// Unknown size: `Downloaded: 2.0 MB @ 8.0 Mbit/s`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn render(&self) -> String {
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => {
                let filled = ((BAR_WIDTH as f64 * percent / 100.0) as usize).min(BAR_WIDTH);
                let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
                format!(
                    "[{bar}] {percent:.1}% ({}) @ {}",
                    size_fraction(self.downloaded, total),
                    self.rate_label()
                )
            }
            _ => {
                let amount = if self.downloaded as f64 > MIB {
                    format!("{:.1} MB", self.downloaded as f64 / MIB)
                } else {
                    format!("{} bytes", group_thousands(self.downloaded))
                };
                match self.mbits_per_sec() {
                    Some(rate) => format!("Downloaded: {amount} @ {rate:.1} Mbit/s"),
                    None => format!("Downloaded: {amount}"),
                }
            }
        }
    }
}

/// Decides when a transfer should report progress.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    downloaded: u64,
    started: Instant,
    last_percent: f64,
    last_reported_bytes: Option<u64>,
    completion_reported: bool,
}

impl ProgressTracker {
    /// Starts tracking a transfer of `total` bytes (or unknown size).
    ///
    /// A zero total is treated as unknown.
    #[must_use]
    pub fn new(total: Option<u64>) -> Self {
        Self::started_at(total, Instant::now())
    }

    /// Starts tracking with an explicit start instant.
    #[must_use]
    pub fn started_at(total: Option<u64>, started: Instant) -> Self {
        Self {
            total: total.filter(|&t| t > 0),
            downloaded: 0,
            started,
            last_percent: 0.0,
            last_reported_bytes: None,
            completion_reported: false,
        }
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Records a written chunk; returns an update when one is due.
    pub fn record(&mut self, chunk_len: usize) -> Option<ProgressUpdate> {
        self.record_at(chunk_len, Instant::now())
    }

    /// Records a written chunk at `now`; returns an update when one is due.
    pub fn record_at(&mut self, chunk_len: usize, now: Instant) -> Option<ProgressUpdate> {
        self.downloaded = self.downloaded.saturating_add(chunk_len as u64);

        let due = match self.total {
            Some(total) => self.known_size_due(total),
            None => self.unknown_size_due(),
        };
        due.then(|| self.emit(now))
    }

    /// Final update after the stream ends, if the last chunk was not already reported.
    pub fn finish(&mut self) -> Option<ProgressUpdate> {
        self.finish_at(Instant::now())
    }

    /// Final update at `now`, if the last chunk was not already reported.
    pub fn finish_at(&mut self, now: Instant) -> Option<ProgressUpdate> {
        (self.last_reported_bytes != Some(self.downloaded)).then(|| self.emit(now))
    }

    #[allow(clippy::cast_precision_loss)]
    fn known_size_due(&mut self, total: u64) -> bool {
        let percent = self.downloaded as f64 * 100.0 / total as f64;
        if self.downloaded >= total {
            if self.completion_reported {
                return false;
            }
            self.completion_reported = true;
            self.last_percent = percent;
            return true;
        }
        if percent - self.last_percent >= PROGRESS_STEP_PERCENT {
            self.last_percent = percent;
            return true;
        }
        false
    }

    fn unknown_size_due(&self) -> bool {
        match self.last_reported_bytes {
            None => true,
            Some(last) => {
                self.downloaded / UNKNOWN_SIZE_PROGRESS_INTERVAL
                    > last / UNKNOWN_SIZE_PROGRESS_INTERVAL
            }
        }
    }

    fn emit(&mut self, now: Instant) -> ProgressUpdate {
        self.last_reported_bytes = Some(self.downloaded);
        ProgressUpdate {
            downloaded: self.downloaded,
            total: self.total,
            elapsed: now.saturating_duration_since(self.started),
        }
    }
}

/// Receives transfer lifecycle events for display.
pub trait ProgressReporter: Send + Sync {
    /// A transfer into `name` is starting.
    fn started(&self, name: &str, total: Option<u64>);

    /// A throttled progress sample for `name`.
    fn update(&self, name: &str, update: &ProgressUpdate);

    /// The transfer into `name` ended; `success` is false when it was discarded.
    fn finished(&self, name: &str, bytes: u64, success: bool);
}

/// Reports progress through `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn started(&self, name: &str, total: Option<u64>) {
        match total {
            Some(total) => info!("Downloading {name} ({} bytes)...", group_thousands(total)),
            None => info!("Downloading {name} (size unknown)..."),
        }
    }

    fn update(&self, name: &str, update: &ProgressUpdate) {
        info!(file = name, "{}", update.render());
    }

    fn finished(&self, name: &str, bytes: u64, success: bool) {
        if success {
            info!("Successfully downloaded: {name} ({} bytes)", group_thousands(bytes));
        }
    }
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn started(&self, _name: &str, _total: Option<u64>) {}

    fn update(&self, _name: &str, _update: &ProgressUpdate) {}

    fn finished(&self, _name: &str, _bytes: u64, _success: bool) {}
}

/// Formats an integer with `,` thousands separators.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats `done/total` scaled to the unit of `total`.
#[allow(clippy::cast_precision_loss)]
fn size_fraction(done: u64, total: u64) -> String {
    let total_f = total as f64;
    if total_f > GIB {
        format!("{:.1}/{:.1} GB", done as f64 / GIB, total_f / GIB)
    } else if total_f > MIB {
        format!("{:.1}/{:.1} MB", done as f64 / MIB, total_f / MIB)
    } else {
        format!("{}/{} bytes", group_thousands(done), group_thousands(total))
    }
}
