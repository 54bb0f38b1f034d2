//! Event loop.

use anyhow::{bail, Context, Result};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sonic_xcvr_common::{provider, Chassis, PresenceTracker, TrackerConfig, XcvrConfig};

/// Loop settings taken from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Timeout passed to each `get_change_event` call (0 blocks).
    pub timeout_ms: i64,
    /// Stop after the first call.
    pub once: bool,
}

/// Builds the chassis for `config`, priming the baseline if requested.
pub async fn build_chassis(config: &XcvrConfig) -> Result<Chassis> {
    let provider = provider::from_config(config)
        .await
        .context("Failed to create presence provider")?;

    let mut tracker = PresenceTracker::new(provider, TrackerConfig::from(&config.tracker));
    if config.tracker.prime_baseline {
        tracker.prime().await;
    }

    Ok(Chassis::new(tracker))
}

/// Polls until cancelled (or once), writing every non-empty event to `out`.
///
/// Returns the number of events written.
pub async fn run<W: Write>(
    chassis: &mut Chassis,
    options: DaemonOptions,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<u64> {
    info!(
        timeout_ms = options.timeout_ms,
        sfps = chassis.get_num_sfps(),
        "Starting presence event loop"
    );

    let mut published = 0u64;
    while !cancel.is_cancelled() {
        let (ok, event) = chassis
            .get_change_event_until(options.timeout_ms, cancel)
            .await;
        if !ok {
            bail!("get_change_event rejected timeout {}ms", options.timeout_ms);
        }

        if event.is_empty() {
            debug!("No presence change");
        } else {
            serde_json::to_writer(&mut *out, &event).context("Failed to encode event")?;
            writeln!(out).context("Failed to write event")?;
            out.flush().context("Failed to flush event")?;
            published += 1;
        }

        if options.once {
            break;
        }
    }

    info!(published = published, "Presence event loop stopped");
    Ok(published)
}
