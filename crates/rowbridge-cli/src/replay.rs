//! Metrics replay
//!
//! Feeds a recorded session, one JSON `MetricsSnapshot` per line, into the peripheral
//! manager. Blank lines and lines starting with `#` are skipped.

use std::time::Duration;

use rowbridge_core::MetricsSnapshot;
use rowbridge_runtime::PeripheralManager;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Parse one line of a recording; `None` for blank and comment lines
pub fn parse_line(line: &str, number: usize) -> Result<Option<MetricsSnapshot>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| CliError::Replay {
            line: number,
            reason: e.to_string(),
        })
}

/// Replay every snapshot of `reader`; returns how many were delivered
///
/// With `realtime` the gap between consecutive snapshot timestamps is slept before each
/// delivery. Timestamps that go backwards are delivered immediately.
pub async fn replay<R>(reader: R, manager: &PeripheralManager, realtime: bool) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut number = 0;
    let mut delivered = 0;
    let mut previous: Option<Duration> = None;

    while let Some(line) = lines.next_line().await? {
        number += 1;
        let Some(snapshot) = parse_line(&line, number)? else {
            continue;
        };
        if realtime {
            if let Some(previous) = previous {
                tokio::time::sleep(snapshot.timestamp.saturating_sub(previous)).await;
            }
            previous = Some(snapshot.timestamp);
        }
        debug!("Replaying snapshot at {:?}", snapshot.timestamp);
        manager.notify_metrics(&snapshot).await;
        delivered += 1;
    }
    info!("Replay finished after {} snapshots", delivered);
    Ok(delivered)
}
