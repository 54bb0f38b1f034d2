//! Chassis-level change events.
//!
//! The platform chassis reports changes grouped by device type. Only
//! transceivers are tracked here, so an event is always `{"sfp": {...}}`.
//!
//! SFPs are numbered from 1 on the chassis, in event keys as well as in
//! [`Chassis::port_index`], whatever numbering the tracker was built with.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{XcvrError, XcvrResult};
use crate::presence::PresenceTracker;
use crate::types::{ChangeEvent, PortIndex, PortNumbering};

/// Change event grouped by device type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisEvent {
    /// Transceiver insertions and removals.
    pub sfp: ChangeEvent,
}

impl ChassisEvent {
    /// Returns true if no device changed.
    pub fn is_empty(&self) -> bool {
        self.sfp.is_empty()
    }
}

/// Chassis view over a presence tracker.
#[derive(Debug)]
pub struct Chassis {
    tracker: PresenceTracker,
}

impl Chassis {
    /// Wraps a tracker, switching its event keys to 1-based SFP indices.
    pub fn new(mut tracker: PresenceTracker) -> Self {
        tracker.set_numbering(PortNumbering::OneBased);
        Self { tracker }
    }

    /// Number of transceiver ports.
    pub fn get_num_sfps(&self) -> usize {
        self.tracker.port_count()
    }

    /// Returns true if `index` (1-based) names a port on this chassis.
    pub fn sfp_index_valid(&self, index: usize) -> bool {
        (1..=self.get_num_sfps()).contains(&index)
    }

    /// Converts a 1-based SFP index into the internal port index.
    pub fn port_index(&self, index: usize) -> XcvrResult<PortIndex> {
        if self.sfp_index_valid(index) {
            Ok(index - 1)
        } else {
            Err(XcvrError::SfpIndexOutOfRange {
                index,
                count: self.get_num_sfps(),
            })
        }
    }

    /// Waits for a transceiver change, see
    /// [`PresenceTracker::get_transceiver_change_event`].
    pub async fn get_change_event(&mut self, timeout_ms: i64) -> (bool, ChassisEvent) {
        self.get_change_event_until(timeout_ms, &CancellationToken::new())
            .await
    }

    /// Cancellable [`get_change_event`](Self::get_change_event).
    pub async fn get_change_event_until(
        &mut self,
        timeout_ms: i64,
        cancel: &CancellationToken,
    ) -> (bool, ChassisEvent) {
        let (succeeded, sfp) = self.tracker.poll_for_change(timeout_ms, cancel).await;
        if succeeded {
            (true, ChassisEvent { sfp })
        } else {
            (false, ChassisEvent::default())
        }
    }
}
