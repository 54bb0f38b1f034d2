//! Transceiver presence tracking for SONiC PDDF platforms.
//!
//! This crate provides the pieces shared by the transceiver event daemon
//! and any platform component that needs to report module insertion or
//! removal:
//!
//! - [`PresenceTracker`]: Polls every port and reports what changed since
//!   the last observation
//! - [`PortStateProvider`]: The presence capability, with PDDF sysfs and
//!   BMC implementations in [`provider`]
//! - [`Chassis`]: Chassis-level `get_change_event` wrapper (`{"sfp": {...}}`)
//! - [`shell`]: Quoted shell command execution
//! - [`config`]: TOML configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sonic_xcvr_common::{PresenceTracker, TrackerConfig, provider::PddfSysfsProvider};
//!
//! let provider = Arc::new(PddfSysfsProvider::new(&config.platform, &config.pddf));
//! let mut tracker = PresenceTracker::new(provider, TrackerConfig::default());
//!
//! let (ok, event) = tracker.get_transceiver_change_event(5000).await;
//! if ok && !event.is_empty() {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```
//!
//! # Event format
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `"1"` | Module inserted |
//! | `"0"` | Module removed |

pub mod chassis;
pub mod config;
pub mod error;
pub mod presence;
pub mod provider;
pub mod shell;
pub mod types;

// Re-export commonly used items at crate root
pub use chassis::{Chassis, ChassisEvent};
pub use config::{Backend, XcvrConfig};
pub use error::{XcvrError, XcvrResult};
pub use presence::{PollOutcome, PollTimeout, PresenceTracker, TrackerConfig};
pub use provider::PortStateProvider;
pub use types::{ChangeEvent, ModuleStatus, PortIndex, PortNumbering, PresenceState};
