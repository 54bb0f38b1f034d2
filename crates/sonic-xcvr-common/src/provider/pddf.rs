//! Presence from PDDF `xcvr_present` sysfs attributes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::PortStateProvider;
use crate::config::{PddfConfig, PlatformConfig, DEVICE_PLACEHOLDER};
use crate::error::{XcvrError, XcvrResult};
use crate::types::{device_name, PortIndex};

/// Raw attribute value meaning "present" when no value map applies.
const DEFAULT_PRESENT_VALUE: &str = "1";

/// Reads one sysfs attribute per port.
///
/// Attribute paths and per-port value maps are resolved at construction,
/// so a poll cycle only reads files.
#[derive(Debug, Clone)]
pub struct PddfSysfsProvider {
    attr_paths: Vec<PathBuf>,
    value_maps: Vec<Option<HashMap<String, bool>>>,
}

impl PddfSysfsProvider {
    /// Creates a provider for `platform.num_ports` ports.
    pub fn new(platform: &PlatformConfig, pddf: &PddfConfig) -> Self {
        let attr_paths = (0..platform.num_ports)
            .map(|port| {
                PathBuf::from(
                    pddf.attr_path_template
                        .replace(DEVICE_PLACEHOLDER, &device_name(port)),
                )
            })
            .collect();

        let value_maps = (0..platform.num_ports)
            .map(|port| {
                pddf.port_type(port + 1)
                    .and_then(|port_type| pddf.presence_value_map.get(port_type))
                    .cloned()
            })
            .collect();

        Self {
            attr_paths,
            value_maps,
        }
    }

    /// Attribute path for a port.
    pub fn attr_path(&self, port: PortIndex) -> Option<&Path> {
        self.attr_paths.get(port).map(PathBuf::as_path)
    }

    fn decode(&self, port: PortIndex, raw: &str) -> bool {
        match self.value_maps.get(port).and_then(Option::as_ref) {
            Some(map) => map.get(raw).copied().unwrap_or(false),
            None => raw == DEFAULT_PRESENT_VALUE,
        }
    }
}

#[async_trait]
impl PortStateProvider for PddfSysfsProvider {
    fn name(&self) -> &'static str {
        "pddf"
    }

    fn port_count(&self) -> usize {
        self.attr_paths.len()
    }

    async fn is_present(&self, port: PortIndex) -> XcvrResult<bool> {
        let path = self
            .attr_path(port)
            .ok_or(XcvrError::PortOutOfRange {
                port,
                max: self.port_count().saturating_sub(1),
            })?;

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| XcvrError::io(path, e))?;

        Ok(self.decode(port, raw.trim()))
    }
}
