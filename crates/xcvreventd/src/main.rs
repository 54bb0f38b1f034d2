//! xcvreventd daemon entry point.
//!
//! Parses the command line, initializes logging, loads the configuration
//! and runs the presence event loop until a shutdown signal arrives.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sonic_xcvr_common::config::DEFAULT_CONFIG_PATH;
use sonic_xcvr_common::{Backend, XcvrConfig};
use sonic_xcvreventd::{build_chassis, run, DaemonOptions};

/// SONiC transceiver presence event daemon
#[derive(Parser, Debug)]
#[command(name = "xcvreventd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Timeout per change-event call in milliseconds (0 blocks until a change)
    #[arg(short = 't', long, default_value = "0")]
    timeout_ms: i64,

    /// Report one change event (or timeout) and exit
    #[arg(long)]
    once: bool,

    /// Override the presence backend (auto, pddf, bmc)
    #[arg(long)]
    backend: Option<Backend>,

    /// Override the number of ports
    #[arg(long)]
    num_ports: Option<usize>,
}

/// Initialize tracing/logging. Logs go to stderr; stdout carries events.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn load_config(args: &Args) -> anyhow::Result<XcvrConfig> {
    let mut config = XcvrConfig::load_or_default(&args.config)?;
    if let Some(backend) = args.backend {
        config.platform.backend = backend;
    }
    if let Some(num_ports) = args.num_ports {
        config.platform.num_ports = num_ports;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting xcvreventd (Rust) ---");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration {}: {:#}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Platform: {} ports, backend {:?}, poll interval {}ms",
        config.platform.num_ports, config.platform.backend, config.tracker.poll_interval_ms
    );

    let mut chassis = match build_chassis(&config).await {
        Ok(chassis) => chassis,
        Err(e) => {
            error!("xcvreventd startup failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        trigger.cancel();
    });

    let options = DaemonOptions {
        timeout_ms: args.timeout_ms,
        once: args.once,
    };

    let mut stdout = std::io::stdout().lock();
    match run(&mut chassis, options, &cancel, &mut stdout).await {
        Ok(published) => {
            info!("xcvreventd exiting normally, {} events published", published);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("xcvreventd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
