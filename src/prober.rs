//! Discovers how many concurrent connections a server tolerates.
//!
//! Waves of capability probes are sent with one more connection each time,
//! starting at one. The last wave in which every probe came back `200 OK` sets
//! the concurrency used for the real download.
use crate::client::{self, ProbeResult};
use crate::config::Settings;
use crate::error::Result;
use futures_util::future::join_all;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Lifetime of a single probe.
    pub timeout: Duration,
    /// Pause after each successful wave.
    pub cooldown: Duration,
    /// Receive cap per probe, in bytes per second.
    pub rate_limit: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ProbeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.probe_timeout(),
            cooldown: settings.probe_cooldown(),
            rate_limit: settings.probe_rate_limit,
        }
    }
}

pub struct ConcurrencyProber {
    client: Client,
    config: ProbeConfig,
}

impl ConcurrencyProber {
    pub fn new(client: Client, config: ProbeConfig) -> Self {
        Self { client, config }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            client::build_probe_client(settings)?,
            ProbeConfig::from(settings),
        ))
    }

    /// Returns the highest connection count, up to `requested_max`, for which a
    /// whole wave of probes was accepted. `0` means even one connection failed.
    pub async fn probe(&self, url: &str, requested_max: usize) -> usize {
        let mut best = 0;

        for thread_count in 1..=requested_max {
            let results = self.wave(url, thread_count).await;
            let rejected: Vec<u16> = results
                .iter()
                .filter(|r| !r.accepted())
                .map(|r| r.http_status)
                .collect();

            if !rejected.is_empty() {
                tracing::info!(thread_count, ?rejected, "probe wave rejected");
                break;
            }

            tracing::info!(thread_count, "probe wave accepted");
            best = thread_count;

            // Let the server recover before the next wave or the real transfer
            if !self.config.cooldown.is_zero() {
                tokio::time::sleep(self.config.cooldown).await;
            }
        }

        best
    }

    /// Runs `thread_count` probes at once and waits for all of them.
    async fn wave(&self, url: &str, thread_count: usize) -> Vec<ProbeResult> {
        let tasks: Vec<_> = (0..thread_count)
            .map(|_| {
                let client = self.client.clone();
                let url = url.to_string();
                let config = self.config;
                tokio::spawn(async move {
                    let limiter = client::probe_limiter(config.rate_limit);
                    client::probe_once(&client, &url, config.timeout, &limiter).await
                })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or(ProbeResult { http_status: 0 }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_millis(500),
            cooldown: Duration::ZERO,
            rate_limit: 1,
        }
    }

    fn prober() -> ConcurrencyProber {
        ConcurrencyProber::new(Client::new(), fast_config())
    }

    #[tokio::test]
    async fn stops_at_first_rejected_wave() {
        let server = MockServer::start().await;

        // Waves 1, 2 and 3 need 1 + 2 + 3 = 6 accepted probes
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(6)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .with_priority(2)
            .mount(&server)
            .await;

        assert_eq!(prober().probe(&server.uri(), 8).await, 3);
        assert_eq!(server.received_requests().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn never_exceeds_requested_max() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert_eq!(prober().probe(&server.uri(), 4).await, 4);
        assert_eq!(server.received_requests().await.unwrap().len(), 1 + 2 + 3 + 4);
    }

    #[tokio::test]
    async fn single_connection_ceiling_runs_one_wave() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(prober().probe(&server.uri(), 1).await, 1);
    }

    #[tokio::test]
    async fn failed_first_wave_yields_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(prober().probe(&server.uri(), 1).await, 0);
    }

    #[tokio::test]
    async fn closed_port_yields_zero() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        assert_eq!(prober().probe(&uri, 3).await, 0);
    }

    #[tokio::test]
    async fn slow_response_counts_as_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        assert_eq!(prober().probe(&server.uri(), 2).await, 0);
    }
}
