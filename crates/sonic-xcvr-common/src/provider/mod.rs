//! Transceiver presence providers.
//!
//! A [`PortStateProvider`] answers "is a module inserted in port N". The
//! tracker never talks to hardware directly; platforms with a BMC and
//! platforms exposing PDDF sysfs attributes get different providers behind
//! the same trait, chosen once by [`from_config`].

mod bmc;
mod pddf;

pub use bmc::{detect_bmc, BmcPresenceProvider};
pub use pddf::PddfSysfsProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Backend, XcvrConfig};
use crate::error::XcvrResult;
use crate::types::PortIndex;

/// Source of per-port module presence.
///
/// Implementations must be cheap enough to call once per port per poll
/// interval. Errors are reported, not hidden: the tracker decides how to
/// treat a failed read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortStateProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Total number of ports managed.
    fn port_count(&self) -> usize;

    /// Returns whether a module is inserted at `port` (zero-based).
    async fn is_present(&self, port: PortIndex) -> XcvrResult<bool>;

    /// Queries ports `0..port_count` in order.
    ///
    /// The default issues one [`is_present`](Self::is_present) per port;
    /// providers that read all ports at once override it.
    async fn probe_ports(&self, port_count: usize) -> Vec<XcvrResult<bool>> {
        let mut results = Vec::with_capacity(port_count);
        for port in 0..port_count {
            results.push(self.is_present(port).await);
        }
        results
    }
}

/// Builds the provider selected by `config.platform.backend`.
///
/// With [`Backend::Auto`] the BMC is probed once here; the choice is not
/// revisited afterwards.
pub async fn from_config(config: &XcvrConfig) -> XcvrResult<Arc<dyn PortStateProvider>> {
    config.validate()?;

    let backend = match config.platform.backend {
        Backend::Auto => {
            if detect_bmc(&config.bmc).await {
                Backend::Bmc
            } else {
                Backend::Pddf
            }
        }
        explicit => explicit,
    };

    let provider: Arc<dyn PortStateProvider> = match backend {
        Backend::Bmc => Arc::new(BmcPresenceProvider::new(&config.platform, &config.bmc)),
        Backend::Pddf | Backend::Auto => Arc::new(PddfSysfsProvider::new(&config.platform, &config.pddf)),
    };

    tracing::info!(
        provider = provider.name(),
        ports = provider.port_count(),
        "Selected presence provider"
    );

    Ok(provider)
}
