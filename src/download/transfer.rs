//! Streaming media transfer with size verification.
//!
//! One call to [`Transferrer::download`] is one attempt at one media URL:
//! derive the clean name, look up the remote size, resolve the target path,
//! stream the body to `<target>.part` in chunks of at most 8 KiB, verify the
//! on-disk size, then rename into place. A partial file never survives a
//! failed attempt and never sits under the final name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, map_reqwest_error};
use super::constants::{CHUNK_SIZE, PARTIAL_SUFFIX};
use super::error::DownloadError;
use super::filename::{NamePlan, clean_name, filename_from_url, resolve_collision};
use super::progress::{ProgressReporter, ProgressTracker};

/// A successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transferred {
    /// Final on-disk path.
    pub path: PathBuf,
    /// File size in bytes.
    pub bytes: u64,
    /// True when an existing file of the expected size was reused.
    pub reused: bool,
}

/// Streams media URLs into an output directory.
#[derive(Clone)]
pub struct Transferrer {
    client: HttpClient,
    reporter: Arc<dyn ProgressReporter>,
    name_locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for Transferrer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transferrer")
            .field("client", &self.client)
            .field("locked_names", &self.name_locks.len())
            .finish_non_exhaustive()
    }
}

impl Transferrer {
    /// Creates a transferrer reporting progress to `reporter`.
    #[must_use]
    pub fn new(client: HttpClient, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            client,
            reporter,
            name_locks: Arc::new(DashMap::new()),
        }
    }

    /// Makes one attempt at downloading `url` into `output_dir`.
    ///
    /// Name resolution and writing for the same cleaned filename are
    /// serialised, so concurrent attempts cannot pick the same free name.
    ///
    /// # Errors
    ///
    /// Returns a network, filesystem, or size-mismatch [`DownloadError`].
    #[instrument(skip(self), fields(url = %url, output_dir = %output_dir.display()))]
    pub async fn download(&self, url: &str, output_dir: &Path) -> Result<Transferred, DownloadError> {
        let cleaned = clean_name(&filename_from_url(url)?);
        let expected_size = self.client.content_length(url).await.filter(|&n| n > 0);

        let key = output_dir.join(&cleaned);
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.place(url, output_dir, &cleaned, expected_size).await
        };
        drop(lock);
        self.release_lock(&key);
        result
    }

    async fn place(
        &self,
        url: &str,
        output_dir: &Path,
        cleaned: &str,
        expected_size: Option<u64>,
    ) -> Result<Transferred, DownloadError> {
        match resolve_collision(output_dir, cleaned, expected_size).await? {
            NamePlan::AlreadyPresent { path, bytes } => {
                info!(
                    path = %path.display(),
                    bytes,
                    "File already exists with matching size"
                );
                Ok(Transferred {
                    path,
                    bytes,
                    reused: true,
                })
            }
            NamePlan::Download(target) => self.transfer(url, &target, expected_size).await,
        }
    }

    /// Streams `url` into `target`, verifying against `expected_size` when known.
    ///
    /// # Errors
    ///
    /// Returns a network, filesystem, or size-mismatch [`DownloadError`]. On
    /// every error the partial file has been removed.
    #[instrument(skip(self), fields(url = %url, target = %target.display()))]
    pub async fn transfer(
        &self,
        url: &str,
        target: &Path,
        expected_size: Option<u64>,
    ) -> Result<Transferred, DownloadError> {
        let display_name = target
            .file_name()
            .map_or_else(|| target.display().to_string(), |n| n.to_string_lossy().into_owned());

        let response = self.client.open_stream(url).await?;

        let partial = PartialFile::new(partial_path_for(target));
        let file = File::create(partial.path())
            .await
            .map_err(|e| DownloadError::io(partial.path(), e))?;

        self.reporter.started(&display_name, expected_size);

        let written = match stream_to_file(
            file,
            response,
            url,
            partial.path(),
            expected_size,
            &display_name,
            self.reporter.as_ref(),
        )
        .await
        {
            Ok(written) => written,
            Err(e) => {
                self.reporter.finished(&display_name, 0, false);
                return Err(e);
            }
        };

        let actual_size = tokio::fs::metadata(partial.path())
            .await
            .map_err(|e| DownloadError::io(partial.path(), e))?
            .len();
        debug!(written, actual_size, "stream finished");

        if let Some(expected) = expected_size
            && actual_size != expected
        {
            warn!(
                file = %display_name,
                expected,
                actual = actual_size,
                "Size mismatch, deleting incomplete file"
            );
            self.reporter.finished(&display_name, actual_size, false);
            partial.discard().await?;
            return Err(DownloadError::size_mismatch(target, expected, actual_size));
        }

        partial.commit(target).await?;
        self.reporter.finished(&display_name, actual_size, true);

        Ok(Transferred {
            path: target.to_path_buf(),
            bytes: actual_size,
            reused: false,
        })
    }

    fn lock_for(&self, key: &Path) -> Arc<Mutex<()>> {
        let entry = self
            .name_locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(&entry)
    }

    /// Drops the lock entry for `key` once no attempt holds it.
    fn release_lock(&self, key: &Path) {
        self.name_locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Returns the in-flight path for `target` (`<target>.part`).
#[must_use]
pub fn partial_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Streams the response body into `file`, returning bytes written.
///
/// The writer is flushed before returning; the handle is closed when it
/// goes out of scope on every path.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    expected_size: Option<u64>,
    display_name: &str,
    reporter: &dyn ProgressReporter,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut tracker = ProgressTracker::new(expected_size);

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| map_reqwest_error(url, e))?;

        for piece in chunk.chunks(CHUNK_SIZE) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| DownloadError::io(file_path, e))?;

            if let Some(update) = tracker.record(piece.len()) {
                reporter.update(display_name, &update);
            }
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    if let Some(update) = tracker.finish() {
        reporter.update(display_name, &update);
    }

    Ok(tracker.downloaded())
}

/// A `.part` file that is deleted unless committed.
#[derive(Debug)]
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the partial file to `target`.
    async fn commit(mut self, target: &Path) -> Result<(), DownloadError> {
        tokio::fs::rename(&self.path, target)
            .await
            .map_err(|e| DownloadError::io(target, e))?;
        self.armed = false;
        Ok(())
    }

    /// Deletes the partial file, surfacing any error.
    async fn discard(mut self) -> Result<(), DownloadError> {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DownloadError::io(&self.path, e)),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove partial file"),
        }
    }
}
