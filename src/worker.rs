use crate::error::{DownloadError, Result};
use crate::progress::ProgressState;
use crate::state::{Segment, WorkerOutcome};
use futures_util::future::join_all;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};

/// Downloads a single segment into its slot of the output file.
///
/// One attempt only. Whatever happens, the segment is counted as finished in
/// `progress` exactly once before this returns.
pub async fn download_segment(
    client: reqwest::Client,
    segment: Segment,
    output_file: PathBuf,
    progress: Arc<ProgressState>,
    resource_size: u64,
) -> WorkerOutcome {
    let mut written = 0;
    let result = transfer(
        &client,
        &segment,
        &output_file,
        &progress,
        resource_size,
        &mut written,
    )
    .await;
    progress.segment_finished();

    match result {
        Ok(()) => {
            tracing::debug!(index = segment.index, written, "segment done");
            WorkerOutcome::succeeded(segment.index, written)
        }
        Err(e) => {
            tracing::warn!(index = segment.index, written, error = %e, "segment failed");
            WorkerOutcome::failed(segment.index, written, e)
        }
    }
}

async fn transfer(
    client: &reqwest::Client,
    segment: &Segment,
    output_file: &Path,
    progress: &ProgressState,
    resource_size: u64,
    written: &mut u64,
) -> Result<()> {
    let fail = |reason: String| DownloadError::SegmentTransfer {
        index: segment.index,
        reason,
    };

    let mut response = client
        .get(&segment.url)
        .header(RANGE, segment.range_header())
        .send()
        .await?;

    // A plain 200 carries the whole resource, which only fits a segment that spans it
    let whole_resource = segment.start == 0 && segment.byte_len() == resource_size;
    match response.status() {
        StatusCode::PARTIAL_CONTENT => {
            let served = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(crate::client::parse_content_range);
            match served {
                Some((start, end, _)) if start == segment.start && end == segment.end => {}
                Some((start, end, _)) => {
                    return Err(fail(format!(
                        "server sent bytes {start}-{end} for requested {}-{}",
                        segment.start, segment.end
                    )));
                }
                None => return Err(fail("206 without a usable Content-Range".to_string())),
            }
        }
        StatusCode::OK if whole_resource => {}
        status => return Err(fail(format!("unexpected status {status}"))),
    }

    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(output_file)
        .await
        .map_err(|e| DownloadError::output(output_file, e))?;

    let mut writer = BufWriter::new(file);
    writer
        .seek(SeekFrom::Start(segment.start))
        .await
        .map_err(|e| DownloadError::output(output_file, e))?;

    let expected = segment.byte_len();
    while let Some(bytes) = response.chunk().await? {
        let remaining = expected - *written;
        let len = bytes.len() as u64;
        let take = len.min(remaining) as usize;

        writer
            .write_all(&bytes[..take])
            .await
            .map_err(|e| DownloadError::output(output_file, e))?;
        *written += take as u64;
        progress.add_bytes(take as u64);

        if len > remaining {
            writer
                .flush()
                .await
                .map_err(|e| DownloadError::output(output_file, e))?;
            return Err(fail(format!("server sent more than the {expected} requested bytes")));
        }
    }

    // Ensure all bytes are on disk before reporting success
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::output(output_file, e))?;

    if *written != expected {
        return Err(fail(format!("body ended after {} of {expected} bytes", *written)));
    }
    Ok(())
}

/// Starts one worker per segment, then waits for all of them.
///
/// Outcomes come back ordered by segment index. A worker that panics is
/// reported as a failed segment; its siblings keep running.
pub async fn run_pool(
    client: &reqwest::Client,
    output_file: &Path,
    segments: Vec<Segment>,
    progress: Arc<ProgressState>,
    resource_size: u64,
) -> Vec<WorkerOutcome> {
    let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();

    let tasks: Vec<_> = segments
        .into_iter()
        .map(|segment| {
            tokio::spawn(download_segment(
                client.clone(),
                segment,
                output_file.to_path_buf(),
                progress.clone(),
                resource_size,
            ))
        })
        .collect();

    let mut outcomes: Vec<WorkerOutcome> = join_all(tasks)
        .await
        .into_iter()
        .zip(indices)
        .map(|(joined, index)| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                // The task died before it could count itself
                progress.segment_finished();
                WorkerOutcome::failed(index, 0, format!("worker panicked: {e}"))
            }
        })
        .collect();

    outcomes.sort_by_key(|o| o.segment_index);
    outcomes
}
