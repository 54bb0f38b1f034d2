//! Transceiver presence event daemon for SONiC.
//!
//! This crate implements the `xcvreventd` daemon, which watches every
//! transceiver cage and publishes insertions and removals.
//!
//! # Responsibilities
//!
//! - Select the presence provider once at startup (PDDF sysfs or BMC)
//! - Poll for presence changes with the configured timeout
//! - Print each non-empty chassis event as one JSON line on stdout
//! - Stop cleanly on SIGINT/SIGTERM
//!
//! # Output
//!
//! | Line | Meaning |
//! |------|---------|
//! | `{"sfp":{"2":"1"}}` | Module inserted in SFP 2 |
//! | `{"sfp":{"11":"0"}}` | Module removed from SFP 11 |
//!
//! Keys are 1-based SFP indices (`PORT2` is SFP 2).

mod daemon;

pub use daemon::{build_chassis, run, DaemonOptions};
