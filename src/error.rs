//! Error taxonomy for the download core.
//!
//! Fatal conditions (`CapabilityProbe`, `Metadata`, and `OutputWrite` before
//! any worker starts) abort a run. Per-segment failures never abort siblings;
//! they are collected into the final report and surface as `Incomplete`.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download request: {0}")]
    InvalidSpec(String),

    /// No concurrency level, not even a single connection, was accepted.
    #[error("capability probe failed: {url} rejected a single connection")]
    CapabilityProbe { url: String },

    #[error("could not determine resource length: {0}")]
    Metadata(String),

    #[error("segment {index} failed: {reason}")]
    SegmentTransfer { index: usize, reason: String },

    #[error("output file {path:?}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download incomplete: segments {failed:?} failed")]
    Incomplete { failed: Vec<usize> },

    #[error("file corruption detected: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = DownloadError> = std::result::Result<T, E>;
