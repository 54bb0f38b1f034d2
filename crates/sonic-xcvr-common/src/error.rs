//! Error types for transceiver presence operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. Presence probe
//! failures never reach the caller of the poll loop; they are folded into
//! "not present" by [`crate::PresenceTracker`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transceiver operations.
pub type XcvrResult<T> = Result<T, XcvrError>;

/// Errors that can occur during transceiver operations.
#[derive(Debug, Error)]
pub enum XcvrError {
    /// Failed to execute a shell command (spawn error).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Shell command did not finish in time and was killed.
    #[error("Shell command timed out after {timeout_ms}ms: '{command}'")]
    ShellTimeout {
        /// The command that was killed.
        command: String,
        /// The limit in milliseconds.
        timeout_ms: u64,
    },

    /// Reading or writing a file (sysfs attribute, config file) failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Poll timeout was negative.
    #[error("Invalid timeout: {timeout_ms}ms")]
    InvalidTimeout {
        /// The rejected value in milliseconds.
        timeout_ms: i64,
    },

    /// Port index outside of the managed range.
    #[error("Port index {port} out of range (0-{max})")]
    PortOutOfRange {
        /// The rejected index.
        port: usize,
        /// Highest valid index.
        max: usize,
    },

    /// Front-panel (1-based) SFP index outside the chassis.
    #[error("SFP index {index} out of range (1-{count})")]
    SfpIndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of SFPs on the chassis.
        count: usize,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// A presence source could not be queried.
    #[error("Presence probe failed on {source_name}: {message}")]
    ProbeFailed {
        /// Provider name.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Hardware returned data that could not be decoded.
    #[error("Malformed {what}: '{raw}'")]
    Malformed {
        /// What was being decoded.
        what: &'static str,
        /// The raw text.
        raw: String,
    },
}

impl XcvrError {
    /// Creates an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed data error.
    pub fn malformed(what: &'static str, raw: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            raw: raw.into(),
        }
    }

    /// Creates a probe failure error.
    pub fn probe_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error comes from a hardware read that may
    /// succeed on the next poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            XcvrError::Io { .. }
                | XcvrError::ShellCommandFailed { .. }
                | XcvrError::ShellTimeout { .. }
                | XcvrError::Malformed { .. }
                | XcvrError::ProbeFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XcvrError::PortOutOfRange { port: 66, max: 65 };
        assert_eq!(err.to_string(), "Port index 66 out of range (0-65)");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = XcvrError::InvalidTimeout { timeout_ms: -5 };
        assert_eq!(err.to_string(), "Invalid timeout: -5ms");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = XcvrError::io(
            "/sys/kernel/pddf/devices/xcvr/PORT1/xcvr_present",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert!(err.to_string().contains("PORT1/xcvr_present"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_is_transient() {
        assert!(XcvrError::malformed("presence bitmap", "zz").is_transient());
        assert!(XcvrError::ShellTimeout {
            command: "ipmitool raw 0x3a 0x03 0x01".to_string(),
            timeout_ms: 5000,
        }
        .is_transient());
        assert!(!XcvrError::invalid_config("tracker.poll_interval_ms", "must be > 0").is_transient());
        assert!(!XcvrError::InvalidTimeout { timeout_ms: -1 }.is_transient());
    }
}
