//! Consolidated run report.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::page::PageReport;
use super::stats::RunStatistics;
use crate::download::constants::MEDIA_EXTENSION;
use crate::download::group_thousands;

const RULE_WIDTH: usize = 60;
const MIB: f64 = 1024.0 * 1024.0;

/// One media file found in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub bytes: u64,
}

/// Summary of a whole run across all source pages.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    /// Folded counters.
    pub totals: RunStatistics,
    /// Per-page detail, in run order.
    pub pages: Vec<PageReport>,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    /// Media files on disk, sorted by name.
    pub files: Vec<FileEntry>,
    /// Sum of `files` sizes.
    pub total_bytes: u64,
    /// The run stopped early on an interrupt.
    pub interrupted: bool,
}

impl FinalReport {
    /// Folds page reports and lists the media files in `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the output directory exists but cannot be read.
    pub fn build(
        pages: Vec<PageReport>,
        output_dir: &Path,
        interrupted: bool,
    ) -> std::io::Result<Self> {
        let totals: RunStatistics = pages.iter().map(|p| &p.stats).sum();
        let files = list_media_files(output_dir)?;
        let total_bytes = files.iter().map(|f| f.bytes).sum();

        Ok(Self {
            totals,
            pages,
            output_dir: std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.to_path_buf()),
            files,
            total_bytes,
            interrupted,
        })
    }

    /// Serialises the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error (not expected for this type).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lists `*.mp4` regular files in `dir`, sorted by name. A missing directory
/// yields an empty list.
///
/// # Errors
///
/// Returns the I/O error when the directory cannot be read.
pub fn list_media_files(dir: &Path) -> std::io::Result<Vec<FileEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(MEDIA_EXTENSION) {
            files.push(FileEntry {
                name,
                bytes: meta.len(),
            });
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

impl fmt::Display for FinalReport {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{rule}")?;
        writeln!(f, "FINAL DOWNLOAD SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Total URLs found across all galleries: {}",
            self.totals.found
        )?;
        writeln!(f, "Successfully downloaded: {}", self.totals.downloaded)?;
        writeln!(f, "Failed downloads: {}", self.totals.failed_count())?;

        if !self.totals.failed.is_empty() {
            writeln!(f, "\nFailed URLs:")?;
            for url in &self.totals.failed {
                writeln!(f, "  - {url}")?;
            }
        }

        if self.interrupted {
            writeln!(f, "\nRun interrupted; remaining galleries were not processed.")?;
        }

        writeln!(f, "\nFiles saved to: {}", self.output_dir.display())?;

        if !self.files.is_empty() {
            writeln!(f, "\nDownloaded files ({}):", self.files.len())?;
            for file in &self.files {
                writeln!(f, "  - {} ({} bytes)", file.name, group_thousands(file.bytes))?;
            }
            writeln!(
                f,
                "\nTotal size: {} bytes ({:.1} MB)",
                group_thousands(self.total_bytes),
                self.total_bytes as f64 / MIB
            )?;
        }
        Ok(())
    }
}
