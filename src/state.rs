//! Values passed between the prober, planner and worker pool.
//!
//! None of these are persisted; a run lives exactly as long as the process.
use crate::error::{DownloadError, Result};
use std::path::PathBuf;
use url::Url;

/// Highest connection count a caller may ask the prober to try.
pub const MAX_THREADS: u8 = 32;

/// What the user asked for: one URL, one output file, an upper bound on connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub url: String,
    pub output: PathBuf,
    /// Upper bound for the capability probe, in `1..=32`.
    pub max_threads: u8,
}

impl DownloadSpec {
    /// Validates the request before the core ever touches the network.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidSpec`] if the URL is not an absolute
    /// `http`/`https` URL or `max_threads` is outside `1..=32`.
    pub fn new(
        url: impl Into<String>,
        output: impl Into<PathBuf>,
        max_threads: u8,
    ) -> Result<Self> {
        let url = url.into();
        let parsed = Url::parse(&url)
            .map_err(|e| DownloadError::InvalidSpec(format!("bad url {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidSpec(format!(
                "unsupported scheme {:?}",
                parsed.scheme()
            )));
        }
        if !(1..=MAX_THREADS).contains(&max_threads) {
            return Err(DownloadError::InvalidSpec(format!(
                "max threads must be between 1 and {MAX_THREADS}, got {max_threads}"
            )));
        }

        let output = output.into();
        if output.as_os_str().is_empty() {
            return Err(DownloadError::InvalidSpec("output path is empty".into()));
        }

        Ok(Self {
            url,
            output,
            max_threads,
        })
    }
}

/// A byte range of the remote resource owned by exactly one worker.
///
/// The range is inclusive, meaning `start` and `end` are both part of the segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position of the segment in the plan.
    pub index: usize,
    /// The starting byte index (0-based).
    pub start: u64,
    /// The ending byte index.
    pub end: u64,
    pub url: String,
}

impl Segment {
    /// Number of bytes covered by the segment.
    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` request header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// What a worker reports when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub segment_index: usize,
    pub success: bool,
    /// Bytes that actually landed in the output file, partial on failure.
    pub bytes_written: u64,
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn succeeded(segment_index: usize, bytes_written: u64) -> Self {
        Self {
            segment_index,
            success: true,
            bytes_written,
            error: None,
        }
    }

    pub fn failed(segment_index: usize, bytes_written: u64, error: impl ToString) -> Self {
        Self {
            segment_index,
            success: false,
            bytes_written,
            error: Some(error.to_string()),
        }
    }
}
