//! Presence through the BMC.
//!
//! The BMC reports every cage in one `ipmitool raw` response: hex bytes
//! forming a bitmap, port 0 in bit 0 of the first byte.

use async_trait::async_trait;
use std::time::Duration;

use super::PortStateProvider;
use crate::config::{BmcConfig, PlatformConfig};
use crate::error::{XcvrError, XcvrResult};
use crate::shell;
use crate::types::PortIndex;

/// Returns true if `config.detect_cmd` identifies a BMC.
///
/// Any failure to run the command counts as "no BMC".
pub async fn detect_bmc(config: &BmcConfig) -> bool {
    match shell::grep(&config.detect_cmd, &config.detect_key).await {
        Ok(Some(line)) => {
            tracing::debug!(line = %line, "BMC detected");
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::debug!(error = %e, "BMC detection failed");
            false
        }
    }
}

/// Decodes `ipmitool raw` output ("ff 03" or "0xff 0x03") into bytes.
fn parse_bitmap(output: &str) -> XcvrResult<Vec<u8>> {
    output
        .split_whitespace()
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16)
                .map_err(|_| XcvrError::malformed("presence bitmap", output))
        })
        .collect()
}

/// Reads the presence bitmap from the BMC.
#[derive(Debug, Clone)]
pub struct BmcPresenceProvider {
    port_count: usize,
    presence_cmd: String,
    active_low: bool,
    command_timeout: Duration,
}

impl BmcPresenceProvider {
    /// Creates a provider for `platform.num_ports` ports.
    pub fn new(platform: &PlatformConfig, bmc: &BmcConfig) -> Self {
        Self {
            port_count: platform.num_ports,
            presence_cmd: bmc.presence_cmd.clone(),
            active_low: bmc.active_low,
            command_timeout: bmc.command_timeout(),
        }
    }

    async fn read_bitmap(&self) -> XcvrResult<Vec<u8>> {
        let output = shell::exec_checked_timeout(&self.presence_cmd, self.command_timeout).await?;
        parse_bitmap(&output)
    }

    fn bit(&self, bitmap: &[u8], port: PortIndex) -> XcvrResult<bool> {
        let byte = *bitmap.get(port / 8).ok_or_else(|| {
            XcvrError::probe_failed(
                self.name(),
                format!("bitmap of {} bytes has no port {}", bitmap.len(), port),
            )
        })?;
        let set = byte & (1u8 << (port % 8)) != 0;
        Ok(set != self.active_low)
    }

    fn check_range(&self, port: PortIndex) -> XcvrResult<()> {
        if port < self.port_count {
            Ok(())
        } else {
            Err(XcvrError::PortOutOfRange {
                port,
                max: self.port_count.saturating_sub(1),
            })
        }
    }
}

#[async_trait]
impl PortStateProvider for BmcPresenceProvider {
    fn name(&self) -> &'static str {
        "bmc"
    }

    fn port_count(&self) -> usize {
        self.port_count
    }

    async fn is_present(&self, port: PortIndex) -> XcvrResult<bool> {
        self.check_range(port)?;
        let bitmap = self.read_bitmap().await?;
        self.bit(&bitmap, port)
    }

    async fn probe_ports(&self, port_count: usize) -> Vec<XcvrResult<bool>> {
        match self.read_bitmap().await {
            Ok(bitmap) => (0..port_count)
                .map(|port| {
                    self.check_range(port)?;
                    self.bit(&bitmap, port)
                })
                .collect(),
            Err(e) => {
                let message = e.to_string();
                (0..port_count)
                    .map(|_| Err(XcvrError::probe_failed(self.name(), message.clone())))
                    .collect()
            }
        }
    }
}
