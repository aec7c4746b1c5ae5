//! Splits a resource into disjoint byte ranges and prepares the output file.
use crate::client;
use crate::error::{DownloadError, Result};
use crate::state::Segment;
use reqwest::Client;
use std::path::Path;

/// Layout of a download: the resource length and one segment per worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub total_size: u64,
    pub segments: Vec<Segment>,
}

/// Divides `total_size` bytes into `threads` contiguous segments.
///
/// Every segment but the last holds `total_size / threads` bytes; the last
/// one also absorbs the remainder. When there are fewer bytes than threads,
/// one single-byte segment per byte is produced instead.
pub fn calculate_segments(url: &str, total_size: u64, threads: usize) -> Vec<Segment> {
    if total_size == 0 || threads == 0 {
        return Vec::new();
    }

    let count = (threads as u64).min(total_size);
    let chunk_size = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                (i + 1) * chunk_size - 1
            };

            Segment {
                index: i as usize,
                start,
                end,
                url: url.to_string(),
            }
        })
        .collect()
}

/// Creates or truncates the output file and sizes it to `total_size`.
///
/// Workers then only ever write inside an already allocated file.
pub async fn allocate_output(path: &Path, total_size: u64) -> Result<()> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::output(path, e))?;
    file.set_len(total_size)
        .await
        .map_err(|e| DownloadError::output(path, e))?;
    Ok(())
}

/// Fetches the resource length, lays out segments and pre-allocates `output`.
pub async fn plan(client: &Client, url: &str, output: &Path, threads: usize) -> Result<Plan> {
    let total_size = client::fetch_total_size(client, url).await?;
    tracing::info!(total_size, threads, "resource length known");

    allocate_output(output, total_size).await?;

    Ok(Plan {
        total_size,
        segments: calculate_segments(url, total_size, threads),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const URL: &str = "http://example.com/file";

    fn assert_partition(segments: &[Segment], total_size: u64) {
        assert_eq!(segments.first().map(|s| s.start), Some(0));
        assert_eq!(segments.last().map(|s| s.end), Some(total_size - 1));
        for (i, pair) in segments.windows(2).enumerate() {
            assert_eq!(pair[0].index, i);
            assert_eq!(pair[1].start, pair[0].end + 1, "gap or overlap after segment {i}");
        }
        for s in segments {
            assert!(s.end >= s.start);
        }
    }

    #[test]
    fn even_split() {
        // 100 bytes, 4 threads -> 25 bytes each
        let segments = calculate_segments(URL, 100, 4);
        assert_eq!(segments.len(), 4);
        assert_eq!((segments[0].start, segments[0].end), (0, 24));
        assert_eq!((segments[3].start, segments[3].end), (75, 99));
        assert_partition(&segments, 100);
    }

    #[test]
    fn last_segment_absorbs_remainder() {
        let segments = calculate_segments(URL, 10, 3);
        let ranges: Vec<_> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, 2), (3, 5), (6, 9)]);
    }

    #[test]
    fn partitions_every_size_and_thread_count() {
        for total_size in (1..=200).chain([4096, 1_000_003]) {
            for threads in 1..=32 {
                let segments = calculate_segments(URL, total_size, threads);
                assert_eq!(segments.len() as u64, (threads as u64).min(total_size));
                assert_partition(&segments, total_size);
            }
        }
    }

    #[test]
    fn fewer_bytes_than_threads() {
        let segments = calculate_segments(URL, 2, 8);
        let ranges: Vec<_> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn segments_carry_the_url() {
        let segments = calculate_segments(URL, 10, 2);
        assert!(segments.iter().all(|s| s.url == URL));
    }

    #[tokio::test]
    async fn allocation_sets_final_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        tokio::fs::write(&path, vec![7u8; 4096]).await.unwrap();

        allocate_output(&path, 10).await.unwrap();

        let content = tokio::fs::read(&path).await.unwrap();
        assert_eq!(content, vec![0u8; 10]);
    }

    #[tokio::test]
    async fn allocation_failure_is_output_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");

        let err = allocate_output(&path, 10).await.unwrap_err();
        assert!(matches!(err, DownloadError::OutputWrite { .. }));
    }
}
