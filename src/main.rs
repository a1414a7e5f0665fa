//! Itho Capture - offline RF capture decoder
//!
//! Reads textual bit captures, picks the repeated transmission in each,
//! undoes the line code and writes decoded frames to stdout as JSON lines.

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use itho_capture::bitbuffer::format_buffer;
use itho_capture::capture::CaptureReader;
use itho_capture::config::Config;
use itho_capture::decoder::DecodePipeline;

fn main() -> Result<()> {
    // Logs go to stderr, stdout carries frames
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   Itho Capture - bit buffer decoder");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    info!("  Line code: {}", config.line_code);
    info!("  Min repeats: {}", config.min_repeats);
    info!("  Min bits: {}", config.min_bits);
    match &config.sync_pattern {
        Some(sync) => info!("  Sync: {{{}}}{}", sync.bits(), hex::encode(sync.bytes())),
        None => info!("  Sync: none"),
    }
    if let Some(max) = config.max_decoded_bits {
        info!("  Max decoded bits: {}", max);
    }

    let reader = CaptureReader::new(config.capture());
    let capture_rx = reader.start().context("Failed to start capture reader")?;

    let mut pipeline = DecodePipeline::new(config.pipeline());
    let stats_interval = Duration::from_secs(config.stats_interval_secs.max(1));
    let mut last_stats = Instant::now();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    loop {
        match capture_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(capture) => {
                if tracing::enabled!(tracing::Level::TRACE) {
                    for line in format_buffer(&capture.bits, false).lines() {
                        tracing::trace!("{}", line);
                    }
                }

                match pipeline.process(capture.bits) {
                    Some(frame) => {
                        info!(
                            ">>> FRAME: line {} | row {} x{} | {} bits | {}{}",
                            capture.line,
                            frame.row,
                            frame.repeats,
                            frame.bits,
                            frame.to_hex(),
                            if frame.complete { "" } else { " (partial)" }
                        );
                        let json = serde_json::to_string(&frame)
                            .context("Failed to serialize frame")?;
                        writeln!(out, "{}", json).context("Failed to write frame")?;
                        out.flush().context("Failed to flush stdout")?;
                    }
                    None => debug!("Line {}: no frame", capture.line),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Capture channel disconnected");
                break;
            }
        }

        if last_stats.elapsed() >= stats_interval {
            info!("[Decoder] {}", pipeline.stats());
            last_stats = Instant::now();
        }
    }

    reader.stop();

    let capture_stats = reader.stats();
    let parse_errors = capture_stats.parse_errors.load(Ordering::Relaxed);
    if parse_errors > 0 {
        warn!("{} capture lines could not be parsed", parse_errors);
    }

    info!("===========================================");
    info!(
        "Shutdown complete. Lines read: {}, {}",
        capture_stats.lines_read.load(Ordering::Relaxed),
        pipeline.stats()
    );
    Ok(())
}
