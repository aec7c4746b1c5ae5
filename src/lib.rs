//! # segfetch
//!
//! `segfetch` downloads a single HTTP resource as concurrent byte-range
//! segments written straight into their place in one output file.
//!
//! A run has three stages:
//! - probe the server with growing waves of rate-capped requests to find the
//!   highest connection count it accepts
//! - fetch the resource length and split it into that many disjoint ranges
//! - transfer every range in parallel, each worker writing only its own slice
//!
//! Progress is shared through [`ProgressState`], which a display layer can
//! poll at any time.

pub mod args;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod planner;
pub mod prober;
pub mod progress;
pub mod state;
pub mod utils;
pub mod worker;

pub use args::Args;
pub use config::Settings;
pub use downloader::{DownloadReport, Downloader};
pub use error::{DownloadError, Result};
pub use progress::{ProgressSnapshot, ProgressState};
pub use state::{DownloadSpec, Segment, WorkerOutcome};
pub use worker::download_segment;
