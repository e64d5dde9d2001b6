// crates/grain-harness/src/staging.rs
// ============================================================================
// Module: Staging Utilities
// Description: Fixture download and directory cleanup helpers.
// Purpose: Stage remote media fixtures locally and remove them afterwards.
// Dependencies: reqwest, thiserror, tokio, url
// ============================================================================

//! ## Overview
//! [`download`] fetches one resource into a staging directory that is created
//! on demand. [`remove_tree`] deletes a directory tree with an iterative
//! worklist: entries are stat'ed without following symlinks, files are
//! unlinked as they are found, and directories are removed deepest first.
//! Invariants:
//! - An existing staging directory is not an error.
//! - Downloads are capped at [`MAX_DOWNLOAD_BYTES`] unless a caller passes
//!   its own limit; an oversize body never leaves a file behind.
//! - Removing an absent path is a no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::Path;
use std::path::PathBuf;

use reqwest::Client;
use reqwest::Response;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name used when the URI path has no usable last segment.
pub const FALLBACK_FILE_NAME: &str = "download.bin";

/// Default cap on a downloaded body (1 GiB).
pub const MAX_DOWNLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// Suffix appended to the staged name while the body is being written.
const PARTIAL_SUFFIX: &str = ".part";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Download and cleanup failures.
#[derive(Debug, Error)]
pub enum StagingError {
    /// URI failed to parse or uses an unsupported scheme.
    #[error("invalid uri {uri}: {detail}")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Parse detail.
        detail: String,
    },
    /// Remote answered with a non-success status.
    #[error("GET {uri} returned {status}")]
    Http {
        /// Requested URI.
        uri: String,
        /// Returned status code.
        status: u16,
    },
    /// Request failed before a full response arrived.
    #[error("GET {uri} failed: {detail}")]
    Transport {
        /// Requested URI.
        uri: String,
        /// Transport detail.
        detail: String,
    },
    /// Body is larger than the download cap.
    #[error("GET {uri} body exceeds {max_bytes} bytes")]
    TooLarge {
        /// Requested URI.
        uri: String,
        /// Applied cap.
        max_bytes: u64,
    },
    /// Filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        /// Path being operated on.
        path: String,
        /// Underlying error.
        source: io::Error,
    },
}

/// Wraps an I/O error with its path.
fn io_error(path: &Path, source: io::Error) -> StagingError {
    StagingError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ============================================================================
// SECTION: Download
// ============================================================================

/// Creates the staging directory, tolerating one that already exists.
///
/// # Errors
///
/// Returns [`StagingError::Io`] for any failure other than "already exists".
pub async fn ensure_staging_dir(dir: &Path) -> Result<(), StagingError> {
    match fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(io_error(dir, err)),
    }
}

/// Derives the staged file name from the last URI path segment.
#[must_use]
pub fn staged_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map_or_else(|| FALLBACK_FILE_NAME.to_string(), ToString::to_string)
}

/// Downloads `uri` into `staging_dir` and returns the written file path.
///
/// Equivalent to [`download_with_limit`] with [`MAX_DOWNLOAD_BYTES`].
///
/// # Errors
///
/// See [`download_with_limit`].
pub async fn download(uri: &str, staging_dir: &Path) -> Result<PathBuf, StagingError> {
    download_with_limit(uri, staging_dir, MAX_DOWNLOAD_BYTES).await
}

/// Downloads `uri` into `staging_dir`, rejecting bodies over `max_bytes`.
///
/// The body is streamed into `<name>.part` and renamed into place once
/// complete. A declared `Content-Length` over the cap fails before any file
/// is created; a streamed body that crosses it removes the partial file.
///
/// # Errors
///
/// Returns [`StagingError`] when the URI is invalid, the request fails or
/// returns a non-success status, the body is too large, or the file cannot be
/// written.
pub async fn download_with_limit(
    uri: &str,
    staging_dir: &Path,
    max_bytes: u64,
) -> Result<PathBuf, StagingError> {
    let url = Url::parse(uri).map_err(|err| StagingError::InvalidUri {
        uri: uri.to_string(),
        detail: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(StagingError::InvalidUri {
            uri: uri.to_string(),
            detail: format!("unsupported scheme {}", url.scheme()),
        });
    }
    ensure_staging_dir(staging_dir).await?;

    let transport = |err: reqwest::Error| StagingError::Transport {
        uri: uri.to_string(),
        detail: err.to_string(),
    };
    let client = Client::builder().build().map_err(transport)?;
    let response = client.get(url.clone()).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(StagingError::Http {
            uri: uri.to_string(),
            status: status.as_u16(),
        });
    }
    if let Some(length) = response.content_length()
        && length > max_bytes
    {
        return Err(StagingError::TooLarge {
            uri: uri.to_string(),
            max_bytes,
        });
    }

    let name = staged_file_name(&url);
    let target = staging_dir.join(&name);
    let partial = staging_dir.join(format!("{name}{PARTIAL_SUFFIX}"));
    let written = match write_body(uri, response, &partial, max_bytes).await {
        Ok(written) => written,
        Err(err) => {
            let _ = fs::remove_file(&partial).await;
            return Err(err);
        }
    };
    fs::rename(&partial, &target).await.map_err(|err| io_error(&target, err))?;
    tracing::info!(uri, path = %target.display(), bytes = written, "fixture downloaded");
    Ok(target)
}

/// Streams the response body into `partial`, returning the byte count.
async fn write_body(
    uri: &str,
    mut response: Response,
    partial: &Path,
    max_bytes: u64,
) -> Result<u64, StagingError> {
    let mut file = fs::File::create(partial).await.map_err(|err| io_error(partial, err))?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(|err| StagingError::Transport {
        uri: uri.to_string(),
        detail: err.to_string(),
    })? {
        written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        if written > max_bytes {
            return Err(StagingError::TooLarge {
                uri: uri.to_string(),
                max_bytes,
            });
        }
        file.write_all(&chunk).await.map_err(|err| io_error(partial, err))?;
    }
    file.flush().await.map_err(|err| io_error(partial, err))?;
    Ok(written)
}

// ============================================================================
// SECTION: Cleanup
// ============================================================================

/// Removes `root` and everything beneath it. Absent paths are a no-op.
///
/// # Errors
///
/// Returns [`StagingError::Io`] when an entry cannot be stat'ed, listed or
/// removed.
pub async fn remove_tree(root: &Path) -> Result<(), StagingError> {
    let meta = match fs::symlink_metadata(root).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_error(root, err)),
    };
    if !meta.is_dir() {
        return remove_file(root).await;
    }

    let mut pending = vec![root.to_path_buf()];
    let mut visited = Vec::new();
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|err| io_error(&dir, err))?;
        while let Some(entry) = entries.next_entry().await.map_err(|err| io_error(&dir, err))? {
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).await.map_err(|err| io_error(&path, err))?;
            if meta.is_dir() {
                pending.push(path);
            } else {
                remove_file(&path).await?;
            }
        }
        visited.push(dir);
    }
    // Descendants are always visited after their parent.
    for dir in visited.iter().rev() {
        match fs::remove_dir(dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_error(dir, err)),
        }
    }
    tracing::debug!(path = %root.display(), dirs = visited.len(), "tree removed");
    Ok(())
}

/// Unlinks one file, tolerating a concurrent removal.
async fn remove_file(path: &Path) -> Result<(), StagingError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(path, err)),
    }
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;
