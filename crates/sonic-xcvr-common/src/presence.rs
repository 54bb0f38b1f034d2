//! Transceiver presence tracker.
//!
//! [`PresenceTracker`] keeps the last reported presence of every port (the
//! baseline) and waits for it to change:
//!
//! 1. Sleep `min(remaining, poll_interval)`
//! 2. Probe every port through the [`PortStateProvider`], bounded by the
//!    remaining budget
//! 3. If anything differs from the baseline, replace the baseline and
//!    return the diff
//! 4. Otherwise charge the measured time against the budget and repeat
//!
//! A timeout with no change is a successful, empty result. Only a negative
//! timeout fails. Cancellation interrupts both the sleep and the probe; a
//! probe cut short by cancellation or the deadline leaves the baseline as
//! it was.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{XcvrError, XcvrResult};
use crate::provider::PortStateProvider;
use crate::types::{ChangeEvent, PortNumbering, PresenceState};

/// Default sleep between probe cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Budget remainders below this count as exhausted.
const MIN_REMAINING: Duration = Duration::from_millis(1);

/// How long a poll may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Wait until a change is seen.
    Forever,
    /// Give up after this long.
    Bounded(Duration),
}

impl PollTimeout {
    /// Converts the platform API convention: `0` waits forever, positive
    /// values are milliseconds, negative values are rejected.
    pub fn from_millis(timeout_ms: i64) -> XcvrResult<Self> {
        match timeout_ms {
            0 => Ok(PollTimeout::Forever),
            ms if ms > 0 => Ok(PollTimeout::Bounded(Duration::from_millis(ms as u64))),
            ms => Err(XcvrError::InvalidTimeout { timeout_ms: ms }),
        }
    }
}

/// Result of one wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// At least one port changed.
    Changed(ChangeEvent),
    /// The budget ran out with no change.
    TimedOut,
    /// The cancellation token fired.
    Cancelled,
}

impl PollOutcome {
    /// The event carried by this outcome, empty unless something changed.
    pub fn into_event(self) -> ChangeEvent {
        match self {
            PollOutcome::Changed(event) => event,
            PollOutcome::TimedOut | PollOutcome::Cancelled => ChangeEvent::new(),
        }
    }
}

/// Tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Sleep between probe cycles.
    pub poll_interval: Duration,
    /// How event keys are rendered.
    pub numbering: PortNumbering,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            numbering: PortNumbering::default(),
        }
    }
}

/// Owns the presence baseline for one set of ports.
///
/// Every method that touches the baseline takes `&mut self`, so a probe,
/// compare and update sequence can never interleave with another one on
/// the same tracker. Share a tracker across tasks only behind a mutex.
pub struct PresenceTracker {
    provider: Arc<dyn PortStateProvider>,
    baseline: PresenceState,
    config: TrackerConfig,
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("provider", &self.provider.name())
            .field("baseline", &self.baseline)
            .field("config", &self.config)
            .finish()
    }
}

impl PresenceTracker {
    /// Creates a tracker covering every port of `provider`, none inserted.
    pub fn new(provider: Arc<dyn PortStateProvider>, config: TrackerConfig) -> Self {
        let port_count = provider.port_count();
        let mut tracker = Self {
            provider,
            baseline: PresenceState::default(),
            config,
        };
        tracker.initialize(port_count);
        tracker
    }

    /// Resets the baseline to `port_count` ports, none inserted.
    pub fn initialize(&mut self, port_count: usize) {
        self.baseline = PresenceState::absent(port_count);
    }

    /// Number of tracked ports.
    pub fn port_count(&self) -> usize {
        self.baseline.len()
    }

    /// The last reported presence snapshot.
    pub fn baseline(&self) -> &PresenceState {
        &self.baseline
    }

    /// Tracker settings.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Changes how keys of subsequent events are rendered.
    pub fn set_numbering(&mut self, numbering: PortNumbering) {
        self.config.numbering = numbering;
    }

    /// Probes every tracked port.
    ///
    /// A failed read counts as "not present"; a flaky read must not look
    /// like a module being pulled. The baseline is not touched.
    pub async fn probe_all(&self) -> PresenceState {
        let port_count = self.baseline.len();
        let mut results = self.provider.probe_ports(port_count).await.into_iter();

        (0..port_count)
            .map(|port| {
                let present = match results.next() {
                    Some(Ok(present)) => present,
                    Some(Err(e)) if e.is_transient() => {
                        tracing::debug!(
                            provider = self.provider.name(),
                            port = port,
                            error = %e,
                            "Presence read failed, treating as absent"
                        );
                        false
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            provider = self.provider.name(),
                            port = port,
                            error = %e,
                            "Presence read rejected, treating as absent"
                        );
                        false
                    }
                    None => false,
                };
                (port, present)
            })
            .collect()
    }

    /// Probes every port, giving up at `deadline`.
    async fn probe_until(&self, deadline: Option<Instant>) -> Option<PresenceState> {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.probe_all()).await.ok(),
            None => Some(self.probe_all().await),
        }
    }

    /// Replaces the baseline with a fresh probe without reporting anything.
    ///
    /// Modules already inserted at startup are then not reported as
    /// insertions on the first poll.
    pub async fn prime(&mut self) {
        self.baseline = self.probe_all().await;
        tracing::info!(
            present = self.baseline.present_count(),
            ports = self.baseline.len(),
            "Presence baseline primed"
        );
    }

    /// Platform API entry point.
    ///
    /// `timeout_ms == 0` blocks until a change, `> 0` bounds the wait,
    /// `< 0` returns `(false, {})` without probing. A timeout with no
    /// change returns `(true, {})`.
    pub async fn get_transceiver_change_event(&mut self, timeout_ms: i64) -> (bool, ChangeEvent) {
        self.poll_for_change(timeout_ms, &CancellationToken::new())
            .await
    }

    /// Same as [`get_transceiver_change_event`](Self::get_transceiver_change_event),
    /// but returns `(true, {})` early once `cancel` fires.
    pub async fn poll_for_change(
        &mut self,
        timeout_ms: i64,
        cancel: &CancellationToken,
    ) -> (bool, ChangeEvent) {
        match PollTimeout::from_millis(timeout_ms) {
            Ok(timeout) => (true, self.wait_for_change(timeout, cancel).await.into_event()),
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting presence poll");
                (false, ChangeEvent::new())
            }
        }
    }

    /// Runs the poll loop until a change, the deadline, or cancellation.
    pub async fn wait_for_change(
        &mut self,
        timeout: PollTimeout,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let mut remaining = match timeout {
            PollTimeout::Forever => None,
            PollTimeout::Bounded(budget) => Some(budget),
        };

        loop {
            let started = Instant::now();
            let nap = match remaining {
                Some(left) => left.min(self.config.poll_interval),
                None => self.config.poll_interval,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Presence poll cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep(nap) => {}
            }

            let deadline = remaining.map(|left| started + left);
            let probed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Presence poll cancelled during probe");
                    return PollOutcome::Cancelled;
                }
                probed = self.probe_until(deadline) => probed,
            };
            let Some(current) = probed else {
                tracing::warn!(
                    provider = self.provider.name(),
                    "Presence probe still running at deadline, abandoned"
                );
                return PollOutcome::TimedOut;
            };

            let event = self.baseline.diff(&current, self.config.numbering);
            self.baseline = current;

            if !event.is_empty() {
                tracing::info!(
                    changed = event.len(),
                    event = ?event,
                    "Transceiver presence changed"
                );
                return PollOutcome::Changed(event);
            }

            if let Some(left) = remaining.as_mut() {
                *left = left.saturating_sub(started.elapsed());
                if *left < MIN_REMAINING {
                    return PollOutcome::TimedOut;
                }
            }
        }
    }
}
