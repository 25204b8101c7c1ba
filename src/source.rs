//! Sample stream producer.
//!
//! Reads newline-delimited JSON samples (as written by a tracer) from a
//! file or stdin and feeds them into the monitor's sample channel. The channel
//! is closed when the input ends, which is how the monitor learns the stream
//! is over.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::state::Sample;

/// Samples buffered between the reader and the monitor
pub const SAMPLE_QUEUE_DEPTH: usize = 1024;

/// What the reader did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub sent: u64,
    /// Lines that were not valid samples
    pub skipped: u64,
}

pub fn sample_channel() -> (mpsc::Sender<Sample>, mpsc::Receiver<Sample>) {
    mpsc::channel(SAMPLE_QUEUE_DEPTH)
}

/// Read samples from `input` (stdin when `None`) until EOF or cancellation
pub async fn run_source(
    input: Option<&Path>,
    tx: mpsc::Sender<Sample>,
    cancel: CancellationToken,
    pace: Duration,
) -> Result<SourceStats> {
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open sample file: {}", path.display()))?;
            read_samples(BufReader::new(file), tx, cancel, pace).await
        }
        None => read_samples(BufReader::new(tokio::io::stdin()), tx, cancel, pace).await,
    }
}

/// Parse one sample per line and forward it. Blank lines and `#` comments
/// are ignored; unparseable lines are logged and skipped.
pub async fn read_samples<R>(
    reader: R,
    tx: mpsc::Sender<Sample>,
    cancel: CancellationToken,
    pace: Duration,
) -> Result<SourceStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SourceStats::default();
    let mut lines = reader.lines();
    let mut line_no: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read sample stream")?,
        };
        let Some(line) = line else {
            tracing::debug!(sent = stats.sent, skipped = stats.skipped, "sample stream ended");
            break;
        };
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let sample = match serde_json::from_str::<Sample>(trimmed) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping malformed sample");
                stats.skipped += 1;
                continue;
            }
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tx.send(sample) => result.is_ok(),
        };
        if !sent {
            // Monitor stopped consuming
            tracing::debug!("sample channel closed by monitor");
            break;
        }
        stats.sent += 1;

        if !pace.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pace) => {}
            }
        }
    }

    Ok(stats)
}
