use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use segfetch::{Args, DownloadSpec, Downloader, ProgressState, Settings, utils};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Redraws a progress bar from the shared counters until every segment has returned.
fn spawn_display(progress: Arc<ProgressState>) -> (ProgressBar, JoinHandle<()>) {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    pb.set_message("Probing");

    let bar = pb.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            let snapshot = progress.report();
            if snapshot.total_segments == 0 {
                continue;
            }
            bar.set_length(snapshot.total_bytes);
            bar.set_position(snapshot.downloaded_bytes);
            bar.set_message(format!(
                "{}/{} segments",
                snapshot.completed_segments, snapshot.total_segments
            ));
            if snapshot.all_returned() {
                break;
            }
        }
    });

    (pb, handle)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    init_tracing(&settings.log_level);

    let threads = args.threads.unwrap_or(settings.threads);
    let spec = DownloadSpec::new(args.url, args.output, threads)?;

    let downloader = Downloader::new(&settings).context("Failed to build HTTP client")?;
    let (pb, display) = spawn_display(downloader.progress());

    let result = downloader.run(&spec).await;
    display.abort();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };

    let snapshot = downloader.progress().report();
    pb.set_position(snapshot.downloaded_bytes);

    if !report.is_complete() {
        pb.abandon_with_message("Incomplete");
        for outcome in report.outcomes.iter().filter(|o| !o.success) {
            eprintln!(
                "Segment {} failed after {} bytes: {}",
                outcome.segment_index,
                outcome.bytes_written,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let report = report.into_result()?;
    pb.finish_with_message(format!("{} segments", report.effective_threads));

    if let Some(expected_hash) = args.verify_sha256 {
        let output = spec.output.clone();
        tokio::task::spawn_blocking(move || utils::verify_file_integrity(&output, &expected_hash))
            .await??;
        println!("Integrity check passed");
    }

    println!(
        "Downloaded {} bytes to {}",
        report.total_size,
        spec.output.display()
    );
    Ok(())
}
