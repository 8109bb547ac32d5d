//! Per-page counters and their fold across pages.

use std::iter::Sum;

use serde::Serialize;

/// Counts for one page run, or for a whole run after folding.
///
/// Values are immutable once a page finishes; pages are combined with
/// [`RunStatistics::merge`] or by summing an iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Unique media URLs extracted.
    pub found: usize,
    /// URLs that ended in a verified file (including reused ones).
    pub downloaded: usize,
    /// Subset of `downloaded` satisfied by an existing file.
    pub reused: usize,
    /// URLs that exhausted their retries, in processing order.
    pub failed: Vec<String>,
}

impl RunStatistics {
    /// Statistics for a page that found `found` URLs and has processed none.
    #[must_use]
    pub fn with_found(found: usize) -> Self {
        Self {
            found,
            ..Self::default()
        }
    }

    /// Number of failed URLs.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Combines two page results; `other`'s failures follow `self`'s.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.found += other.found;
        self.downloaded += other.downloaded;
        self.reused += other.reused;
        self.failed.extend(other.failed);
        self
    }
}

impl Sum for RunStatistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::merge)
    }
}

impl<'a> Sum<&'a RunStatistics> for RunStatistics {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.cloned().sum()
    }
}
