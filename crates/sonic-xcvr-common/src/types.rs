//! Presence snapshots and change events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Zero-based port index used internally.
pub type PortIndex = usize;

/// Returns the PDDF device name for a port (`PORT1` for index 0).
pub fn device_name(port: PortIndex) -> String {
    format!("PORT{}", port + 1)
}

/// How port indices are rendered as change event keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortNumbering {
    /// Key is the internal index (`"0"` for the first port).
    #[default]
    ZeroBased,
    /// Key is the front-panel number (`"1"` for the first port).
    OneBased,
}

impl PortNumbering {
    /// Renders the event key for a port.
    pub fn key(&self, port: PortIndex) -> String {
        match self {
            PortNumbering::ZeroBased => port.to_string(),
            PortNumbering::OneBased => (port + 1).to_string(),
        }
    }
}

/// Status marker carried in a change event.
///
/// Serialized as the literal strings `"1"` and `"0"` expected by the
/// platform event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleStatus {
    /// A module was inserted.
    #[serde(rename = "1")]
    Inserted,
    /// A module was removed.
    #[serde(rename = "0")]
    Removed,
}

impl ModuleStatus {
    /// Status for a port that now reads `present`.
    pub fn from_presence(present: bool) -> Self {
        if present {
            ModuleStatus::Inserted
        } else {
            ModuleStatus::Removed
        }
    }

    /// Returns the wire marker.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Inserted => "1",
            ModuleStatus::Removed => "0",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence of every managed port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    ports: BTreeMap<PortIndex, bool>,
}

impl PresenceState {
    /// Creates a state with `port_count` ports, none inserted.
    pub fn absent(port_count: usize) -> Self {
        (0..port_count).map(|port| (port, false)).collect()
    }

    /// Number of ports in the snapshot.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns true if the snapshot covers no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Presence of one port, `None` if the port is not tracked.
    pub fn get(&self, port: PortIndex) -> Option<bool> {
        self.ports.get(&port).copied()
    }

    /// Iterates over `(port, present)` in port order.
    pub fn iter(&self) -> impl Iterator<Item = (PortIndex, bool)> + '_ {
        self.ports.iter().map(|(port, present)| (*port, *present))
    }

    /// Number of ports currently reading present.
    pub fn present_count(&self) -> usize {
        self.ports.values().filter(|present| **present).count()
    }

    /// Builds the event turning `self` into `current`.
    ///
    /// Ports missing from `self` are compared against "not present".
    pub fn diff(&self, current: &PresenceState, numbering: PortNumbering) -> ChangeEvent {
        let mut event = ChangeEvent::new();
        for (port, present) in current.iter() {
            if self.get(port).unwrap_or(false) != present {
                event.insert(numbering.key(port), ModuleStatus::from_presence(present));
            }
        }
        event
    }
}

impl FromIterator<(PortIndex, bool)> for PresenceState {
    fn from_iter<I: IntoIterator<Item = (PortIndex, bool)>>(iter: I) -> Self {
        Self {
            ports: iter.into_iter().collect(),
        }
    }
}

/// Ports whose presence changed since the last reported observation.
///
/// Serializes to a flat JSON object such as `{"2": "1", "11": "0"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeEvent(BTreeMap<String, ModuleStatus>);

impl ChangeEvent {
    /// Creates an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a status for a port key.
    pub fn insert(&mut self, key: impl Into<String>, status: ModuleStatus) {
        self.0.insert(key.into(), status);
    }

    /// Status recorded for a port key.
    pub fn get(&self, key: &str) -> Option<ModuleStatus> {
        self.0.get(key).copied()
    }

    /// Returns true if no port changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed ports.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(key, status)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ModuleStatus)> + '_ {
        self.0.iter().map(|(key, status)| (key.as_str(), *status))
    }
}
