//! Filename derivation, cleaning, and collision resolution for downloads.
//!
//! Remote names look like `movie-title-1652393410-9.mp4`: a dash-separated
//! title followed by an ephemeral timestamp/id pair. [`clean_name`] turns that
//! into `movie title.mp4`, and [`resolve_collision`] picks a path in the
//! output directory that never overwrites a different file.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use super::constants::MEDIA_EXTENSION;
use super::error::DownloadError;

/// Highest `(n)` suffix tried before giving up.
const MAX_COLLISION_SUFFIX: u32 = 9_999;

/// Name used when the URL has no usable last path segment.
const FALLBACK_STEM: &str = "video";

/// Trailing `-<digits>-<digits>` pair appended by the hosting site.
#[allow(clippy::expect_used)]
static TRAILING_ID_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+-\d+$").expect("trailing id regex is valid")); // Static pattern, safe to panic

/// Where a media file should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePlan {
    /// Nothing usable exists yet; download into this path.
    Download(PathBuf),
    /// A file with exactly the expected size already exists; skip the transfer.
    AlreadyPresent {
        /// The existing file.
        path: PathBuf,
        /// Its size in bytes.
        bytes: u64,
    },
}

/// Derives the raw local filename for a media URL.
///
/// Takes the last path segment, percent-decodes it, replaces characters that
/// are unsafe on common filesystems, and appends the media extension when it
/// is missing.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] if `url` cannot be parsed.
pub fn filename_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map(|last| {
            urlencoding::decode(last).map_or_else(
                |e| {
                    debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
                    last.to_string()
                },
                std::borrow::Cow::into_owned,
            )
        });

    let mut name = segment.map_or_else(|| FALLBACK_STEM.to_string(), |s| sanitize_filename(&s));
    if !name.ends_with(MEDIA_EXTENSION) {
        name.push_str(MEDIA_EXTENSION);
    }
    Ok(name)
}

/// Cleans a raw media filename into a human-readable title.
///
/// Strips the media extension, removes a trailing `-<digits>-<digits>` pair
/// (only at the very end), turns the remaining dashes into spaces, and
/// reattaches the extension. Pure and idempotent.
///
/// ```
/// use reelfetch_core::download::clean_name;
///
/// assert_eq!(clean_name("movie-title-1652393410-9.mp4"), "movie title.mp4");
/// ```
#[must_use]
pub fn clean_name(raw: &str) -> String {
    let stem = raw.strip_suffix(MEDIA_EXTENSION).unwrap_or(raw);
    let stem = TRAILING_ID_PAIR.replace(stem, "");
    let stem = stem.replace('-', " ");
    format!("{stem}{MEDIA_EXTENSION}")
}

/// Picks the download target for `cleaned` inside `dir`.
///
/// Tries `name.ext`, `name (2).ext`, `name (3).ext`, ... . An existing
/// candidate whose size equals `expected_size` means the file is already
/// downloaded. Existing candidates with another size (or when the expected
/// size is unknown) are skipped. The first free candidate is the target.
///
/// Identity is inferred from size alone; no checksum is computed.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if a candidate cannot be inspected, or
/// [`DownloadError::NamesExhausted`] when every candidate is taken.
pub async fn resolve_collision(
    dir: &Path,
    cleaned: &str,
    expected_size: Option<u64>,
) -> Result<NamePlan, DownloadError> {
    for counter in 1..=MAX_COLLISION_SUFFIX {
        let candidate = dir.join(candidate_name(cleaned, counter));

        let existing_size = match tokio::fs::metadata(&candidate).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %candidate.display(), "free candidate");
                return Ok(NamePlan::Download(candidate));
            }
            Err(e) => return Err(DownloadError::io(candidate, e)),
        };

        if expected_size == Some(existing_size) {
            debug!(
                path = %candidate.display(),
                bytes = existing_size,
                "existing file matches expected size"
            );
            return Ok(NamePlan::AlreadyPresent {
                path: candidate,
                bytes: existing_size,
            });
        }

        debug!(
            path = %candidate.display(),
            existing = existing_size,
            expected = ?expected_size,
            "name taken by a different file"
        );
    }

    Err(DownloadError::names_exhausted(dir, cleaned))
}

/// Returns `name.ext` for counter 1, otherwise `name (n).ext`.
fn candidate_name(cleaned: &str, counter: u32) -> String {
    if counter <= 1 {
        return cleaned.to_string();
    }
    let (stem, ext) = match cleaned.strip_suffix(MEDIA_EXTENSION) {
        Some(stem) => (stem, MEDIA_EXTENSION),
        None => match cleaned.rfind('.') {
            Some(pos) if pos > 0 => (&cleaned[..pos], &cleaned[pos..]),
            _ => (cleaned, ""),
        },
    };
    format!("{stem} ({counter}){ext}")
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
