//! Presence tracker integration tests
//!
//! Drives the poll loop against a scripted provider on a paused tokio
//! clock, so sleeps complete instantly and elapsed time is exact.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sonic_xcvr_common::{
    ChangeEvent, ModuleStatus, PollOutcome, PollTimeout, PortIndex, PortNumbering,
    PortStateProvider, PresenceState, PresenceTracker, TrackerConfig, XcvrError, XcvrResult,
};

/// A presence flip applied at the start of the given probe cycle (1-based).
#[derive(Clone, Copy)]
struct Flip {
    cycle: usize,
    port: PortIndex,
    present: bool,
}

/// Provider whose cages change according to a script.
struct ScriptedProvider {
    presence: Mutex<Vec<bool>>,
    script: Vec<Flip>,
    failing: HashSet<PortIndex>,
    probe_delay: Duration,
    cycles: AtomicUsize,
}

impl ScriptedProvider {
    fn new(initial: Vec<bool>) -> Self {
        Self {
            presence: Mutex::new(initial),
            script: Vec::new(),
            failing: HashSet::new(),
            probe_delay: Duration::ZERO,
            cycles: AtomicUsize::new(0),
        }
    }

    fn absent(ports: usize) -> Self {
        Self::new(vec![false; ports])
    }

    fn flip(mut self, cycle: usize, port: PortIndex, present: bool) -> Self {
        self.script.push(Flip {
            cycle,
            port,
            present,
        });
        self
    }

    fn failing(mut self, port: PortIndex) -> Self {
        self.failing.insert(port);
        self
    }

    /// Every probe cycle takes `delay` before answering.
    fn slow(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortStateProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn port_count(&self) -> usize {
        self.presence.lock().unwrap().len()
    }

    async fn is_present(&self, port: PortIndex) -> XcvrResult<bool> {
        if self.failing.contains(&port) {
            return Err(XcvrError::probe_failed("scripted", "i2c read timed out"));
        }
        Ok(self.presence.lock().unwrap()[port])
    }

    async fn probe_ports(&self, port_count: usize) -> Vec<XcvrResult<bool>> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut presence = self.presence.lock().unwrap();
            for flip in self.script.iter().filter(|f| f.cycle == cycle) {
                presence[flip.port] = flip.present;
            }
        }

        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }

        let mut results = Vec::with_capacity(port_count);
        for port in 0..port_count {
            results.push(self.is_present(port).await);
        }
        results
    }
}

fn tracker(provider: &Arc<ScriptedProvider>) -> PresenceTracker {
    PresenceTracker::new(provider.clone(), TrackerConfig::default())
}

fn event(entries: &[(&str, ModuleStatus)]) -> ChangeEvent {
    let mut event = ChangeEvent::new();
    for (key, status) in entries {
        event.insert(*key, *status);
    }
    event
}

fn assert_elapsed_near(start: Instant, expected_ms: u64) {
    let elapsed = start.elapsed();
    let expected = Duration::from_millis(expected_ms);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {:?}, expected about {:?}",
        elapsed,
        expected
    );
}

#[tokio::test(start_paused = true)]
async fn test_initial_baseline_all_absent() {
    let provider = Arc::new(ScriptedProvider::absent(8));
    let tracker = tracker(&provider);

    assert_eq!(tracker.baseline(), &PresenceState::absent(8));
    assert_eq!(provider.cycles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_change_times_out_with_empty_event() {
    let provider = Arc::new(ScriptedProvider::absent(5));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, event) = tracker.get_transceiver_change_event(2500).await;

    assert!(ok);
    assert!(event.is_empty());
    assert_eq!(tracker.baseline(), &PresenceState::absent(5));
    assert_elapsed_near(start, 2500);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_budget_takes_three_cycles() {
    let provider = Arc::new(ScriptedProvider::absent(5));
    let mut tracker = tracker(&provider);

    let outcome = tracker
        .wait_for_change(
            PollTimeout::Bounded(Duration::from_millis(2500)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(provider.cycles(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_shorter_than_interval() {
    let provider = Arc::new(ScriptedProvider::absent(2));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, event) = tracker.get_transceiver_change_event(300).await;

    assert!(ok);
    assert!(event.is_empty());
    assert_eq!(provider.cycles(), 1);
    assert_elapsed_near(start, 300);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_wait_detects_insertion() {
    let provider = Arc::new(ScriptedProvider::absent(5).flip(3, 2, true));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(0).await;

    assert!(ok);
    assert_eq!(got, event(&[("2", ModuleStatus::Inserted)]));
    assert_eq!(tracker.baseline().get(2), Some(true));
    assert_eq!(provider.cycles(), 3);
    assert_elapsed_near(start, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_change_on_first_cycle_returns_immediately() {
    let provider = Arc::new(ScriptedProvider::absent(4).flip(1, 0, true));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(10_000).await;

    assert!(ok);
    assert_eq!(got, event(&[("0", ModuleStatus::Inserted)]));
    assert_eq!(provider.cycles(), 1);
    assert_elapsed_near(start, 1000);
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_changes_reported_together() {
    let provider = Arc::new(
        ScriptedProvider::absent(5)
            .flip(2, 1, true)
            .flip(2, 3, true),
    );
    let mut tracker = tracker(&provider);

    let (ok, got) = tracker.get_transceiver_change_event(0).await;

    assert!(ok);
    assert_eq!(
        got,
        event(&[("1", ModuleStatus::Inserted), ("3", ModuleStatus::Inserted)])
    );

    // Nothing left to report
    let (ok, again) = tracker.get_transceiver_change_event(1000).await;
    assert!(ok);
    assert!(again.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_removal_reported_as_zero() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![false, false, false, false, true]).flip(2, 4, false),
    );
    let mut tracker = tracker(&provider);
    tracker.prime().await;
    assert_eq!(tracker.baseline().get(4), Some(true));

    let (ok, got) = tracker.get_transceiver_change_event(0).await;

    assert!(ok);
    assert_eq!(got, event(&[("4", ModuleStatus::Removed)]));
    assert_eq!(tracker.baseline().get(4), Some(false));
    assert_eq!(
        serde_json::to_string(&got).unwrap(),
        r#"{"4":"0"}"#
    );
}

#[tokio::test(start_paused = true)]
async fn test_unprimed_tracker_reports_modules_present_at_start() {
    let provider = Arc::new(ScriptedProvider::new(vec![true, false, true]));
    let mut tracker = tracker(&provider);

    let (ok, got) = tracker.get_transceiver_change_event(0).await;

    assert!(ok);
    assert_eq!(
        got,
        event(&[("0", ModuleStatus::Inserted), ("2", ModuleStatus::Inserted)])
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_reads_are_not_errors() {
    let provider = Arc::new(ScriptedProvider::absent(3).failing(1));
    let mut tracker = tracker(&provider);

    let (ok, got) = tracker.get_transceiver_change_event(2000).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(tracker.baseline().get(1), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_negative_timeout_rejected_without_probing() {
    let provider = Arc::new(ScriptedProvider::absent(5));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(-5).await;

    assert!(!ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_indefinite_wait() {
    let provider = Arc::new(ScriptedProvider::absent(4));
    let mut tracker = tracker(&provider);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.cancel();
    });

    let (ok, got) = tracker.poll_for_change(0, &cancel).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 2);
    assert_eq!(tracker.baseline(), &PresenceState::absent(4));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_hung_probe() {
    let provider = Arc::new(
        ScriptedProvider::absent(4)
            .flip(1, 0, true)
            .slow(Duration::from_secs(3600)),
    );
    let mut tracker = tracker(&provider);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let (ok, got) = tracker.poll_for_change(0, &cancel).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 1);
    assert_elapsed_near(start, 1500);
    // The interrupted cycle saw port 0 but must not record it
    assert_eq!(tracker.baseline(), &PresenceState::absent(4));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_hung_probe() {
    let provider = Arc::new(ScriptedProvider::absent(3).slow(Duration::from_secs(3600)));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(2000).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 1);
    assert_elapsed_near(start, 2000);
}

#[tokio::test(start_paused = true)]
async fn test_probe_time_counts_against_timeout() {
    // 1000ms sleep + 400ms probe leaves 1100ms; the second probe starts
    // at 2400ms and is cut off at the 2500ms deadline
    let provider = Arc::new(ScriptedProvider::absent(4).slow(Duration::from_millis(400)));
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(2500).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 2);
    assert_elapsed_near(start, 2500);
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_change_reported_after_probe_completes() {
    let provider = Arc::new(
        ScriptedProvider::absent(4)
            .flip(2, 1, true)
            .slow(Duration::from_millis(400)),
    );
    let mut tracker = tracker(&provider);

    let start = Instant::now();
    let (ok, got) = tracker.get_transceiver_change_event(5000).await;

    assert!(ok);
    assert_eq!(got, event(&[("1", ModuleStatus::Inserted)]));
    assert_eq!(provider.cycles(), 2);
    assert_elapsed_near(start, 2800);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_returns_cancelled() {
    let provider = Arc::new(ScriptedProvider::absent(4).flip(1, 0, true));
    let mut tracker = tracker(&provider);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = tracker.wait_for_change(PollTimeout::Forever, &cancel).await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(provider.cycles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_based_numbering() {
    let provider = Arc::new(ScriptedProvider::absent(4).flip(1, 0, true));
    let config = TrackerConfig {
        numbering: PortNumbering::OneBased,
        ..TrackerConfig::default()
    };
    let mut tracker = PresenceTracker::new(provider.clone(), config);

    let (ok, got) = tracker.get_transceiver_change_event(0).await;

    assert!(ok);
    assert_eq!(got, event(&[("1", ModuleStatus::Inserted)]));
    assert_eq!(tracker.baseline().get(0), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_interval() {
    let provider = Arc::new(ScriptedProvider::absent(2));
    let config = TrackerConfig {
        poll_interval: Duration::from_millis(250),
        ..TrackerConfig::default()
    };
    let mut tracker = PresenceTracker::new(provider.clone(), config);

    let (ok, got) = tracker.get_transceiver_change_event(1000).await;

    assert!(ok);
    assert!(got.is_empty());
    assert_eq!(provider.cycles(), 4);
}
