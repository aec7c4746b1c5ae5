//! HTTP transport: client construction, metadata lookups and capability probes.
use crate::config::Settings;
use crate::error::{DownloadError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

pub type ProbeLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Status observed by a single capability probe; `0` means no response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub http_status: u16,
}

impl ProbeResult {
    pub fn accepted(&self) -> bool {
        self.http_status == 200
    }
}

/// Builds the client used for metadata requests and segment transfers.
pub fn build_client(settings: &Settings) -> Result<Client> {
    Ok(Client::builder().user_agent(&settings.user_agent).build()?)
}

/// Builds the client used for capability probes.
///
/// Idle connections are never kept, so nothing opened while probing can be
/// handed to a segment transfer later.
pub fn build_probe_client(settings: &Settings) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(&settings.user_agent)
        .pool_max_idle_per_host(0)
        .build()?)
}

/// Builds the per-probe receive cap.
pub fn probe_limiter(bytes_per_second: u32) -> ProbeLimiter {
    let rate = NonZeroU32::new(bytes_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// Issues one rate-capped GET and reports the status it got back.
///
/// The status is taken as soon as headers arrive. The body is then drained
/// through `limiter` and thrown away until `timeout` has elapsed, so the
/// connection stays open for the whole probe window.
pub async fn probe_once(
    client: &Client,
    url: &str,
    timeout: Duration,
    limiter: &ProbeLimiter,
) -> ProbeResult {
    let deadline = Instant::now() + timeout;

    let mut response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "probe got no response");
            return ProbeResult { http_status: 0 };
        }
    };
    let http_status = response.status().as_u16();

    let drain = async {
        while let Ok(Some(bytes)) = response.chunk().await {
            let Ok(len) = u32::try_from(bytes.len()) else {
                break;
            };
            let Some(n) = NonZeroU32::new(len) else {
                continue;
            };
            if limiter.until_n_ready(n).await.is_err() {
                // Burst larger than the cap allows: sit on the connection.
                std::future::pending::<()>().await;
            }
        }
    };
    let _ = tokio::time::timeout_at(deadline, drain).await;

    ProbeResult { http_status }
}

/// Fetches the Content-Length of a resource.
///
/// Tries a HEAD request first. Servers that omit the length on HEAD are asked
/// for the first byte instead, and the total is read from `Content-Range`.
///
/// # Errors
///
/// Returns [`DownloadError::Metadata`] if neither request yields a positive length.
pub async fn fetch_total_size(client: &Client, url: &str) -> Result<u64> {
    let head_error = match head_length(client, url).await {
        Ok(size) => return Ok(size),
        Err(reason) => reason,
    };
    tracing::debug!(reason = %head_error, "HEAD gave no length, trying a one-byte range");

    match range_length(client, url).await {
        Ok(size) => Ok(size),
        Err(reason) => Err(DownloadError::Metadata(format!(
            "{head_error}; range probe: {reason}"
        ))),
    }
}

async fn head_length(client: &Client, url: &str) -> std::result::Result<u64, String> {
    let response = client.head(url).send().await.map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HEAD failed. Status Code: {}", response.status()));
    }

    let length = response
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or("Content-Length not found in response header")?
        .to_str()
        .map_err(|e| e.to_string())?
        .parse::<u64>()
        .map_err(|e| e.to_string())?;

    positive(length)
}

async fn range_length(client: &Client, url: &str) -> std::result::Result<u64, String> {
    let response = client
        .get(url)
        .header(RANGE, "bytes=0-0")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status() != reqwest::StatusCode::PARTIAL_CONTENT {
        return Err(format!("range request returned {}", response.status()));
    }

    let header = response
        .headers()
        .get(CONTENT_RANGE)
        .ok_or("Content-Range not found in response header")?
        .to_str()
        .map_err(|e| e.to_string())?;

    positive(parse_content_range_total(header).ok_or("Content-Range has no known total")?)
}

fn positive(length: u64) -> std::result::Result<u64, String> {
    if length == 0 {
        Err("server reported a zero length".to_string())
    } else {
        Ok(length)
    }
}

/// Splits `bytes a-b/N` into `(a, b, Some(N))`; an unknown total (`*`) gives `None`.
pub fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.rsplit_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    let total = match total.trim() {
        "*" => None,
        n => Some(n.parse().ok()?),
    };
    Some((start, end, total))
}

/// Extracts `N` from `bytes a-b/N`. An unknown total (`*`) yields `None`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    parse_content_range(value)?.2
}
