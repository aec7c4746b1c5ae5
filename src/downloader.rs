use crate::client;
use crate::config::Settings;
use crate::error::{DownloadError, Result};
use crate::planner;
use crate::progress::ProgressState;
use crate::prober::ConcurrencyProber;
use crate::state::{DownloadSpec, WorkerOutcome};
use crate::worker;
use reqwest::Client;
use std::sync::Arc;

/// Result of a run that got as far as launching workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub total_size: u64,
    /// Number of segments actually run.
    pub effective_threads: usize,
    /// One entry per segment, ordered by index.
    pub outcomes: Vec<WorkerOutcome>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failed_segments(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.segment_index)
            .collect()
    }

    pub fn bytes_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes_written).sum()
    }

    /// Turns any failed segment into [`DownloadError::Incomplete`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(DownloadError::Incomplete {
                failed: self.failed_segments(),
            })
        }
    }
}

/// Runs probe, plan and transfer for one resource.
///
/// Owns the HTTP clients and the progress counters; nothing here is global.
pub struct Downloader {
    client: Client,
    prober: ConcurrencyProber,
    progress: Arc<ProgressState>,
}

impl Downloader {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self::with_parts(
            client::build_client(settings)?,
            ConcurrencyProber::from_settings(settings)?,
        ))
    }

    pub fn with_parts(client: Client, prober: ConcurrencyProber) -> Self {
        Self {
            client,
            prober,
            progress: Arc::new(ProgressState::new()),
        }
    }

    /// Counters for a display layer to poll while [`Downloader::run`] is in flight.
    pub fn progress(&self) -> Arc<ProgressState> {
        self.progress.clone()
    }

    /// Downloads `spec.url` into `spec.output`.
    ///
    /// # Errors
    ///
    /// Fails before any transfer starts if no connection count is accepted,
    /// the resource length is unknown, or the output file cannot be created.
    /// Failed segments do not make this return `Err`; check the report.
    pub async fn run(&self, spec: &DownloadSpec) -> Result<DownloadReport> {
        tracing::info!(url = %spec.url, max = spec.max_threads, "probing server concurrency");
        let effective = self
            .prober
            .probe(&spec.url, usize::from(spec.max_threads))
            .await;
        if effective == 0 {
            return Err(DownloadError::CapabilityProbe {
                url: spec.url.clone(),
            });
        }

        let plan = planner::plan(&self.client, &spec.url, &spec.output, effective).await?;
        let effective_threads = plan.segments.len();
        self.progress.begin(plan.total_size, effective_threads);
        tracing::info!(
            effective_threads,
            output = %spec.output.display(),
            "starting segment transfers"
        );

        let outcomes = worker::run_pool(
            &self.client,
            &spec.output,
            plan.segments,
            self.progress.clone(),
            plan.total_size,
        )
        .await;

        let report = DownloadReport {
            total_size: plan.total_size,
            effective_threads,
            outcomes,
        };
        if report.is_complete() {
            tracing::info!(bytes = report.bytes_written(), "download complete");
        } else {
            tracing::warn!(failed = ?report.failed_segments(), "download incomplete");
        }
        Ok(report)
    }
}
