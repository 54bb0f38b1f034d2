//! Shell command execution for BMC queries.
//!
//! BMC platforms expose transceiver presence only through `ipmitool`, so
//! the BMC provider and BMC detection go through these helpers. Arguments
//! taken from configuration are quoted with [`shellquote`].
//!
//! # Example
//!
//! ```ignore
//! use sonic_xcvr_common::shell::{self, IPMITOOL_CMD};
//!
//! let out = shell::exec_checked(&format!("{} raw 0x3a 0x03 0x01", IPMITOOL_CMD)).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{XcvrError, XcvrResult};

/// Path to the `ipmitool` command for BMC access.
pub const IPMITOOL_CMD: &str = "/usr/bin/ipmitool";

/// Path to the `grep` command.
pub const GREP_CMD: &str = "/bin/grep";

/// Limit applied by [`exec`] and [`exec_checked`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// ```
/// use sonic_xcvr_common::shell::shellquote;
///
/// assert_eq!(shellquote("Firmware Revision"), "\"Firmware Revision\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// Trimmed stdout.
    pub stdout: String,
    /// Trimmed stderr.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command through `/bin/sh -c` with the default limit.
///
/// Returns `Err` when the command could not be spawned or ran past
/// [`DEFAULT_COMMAND_TIMEOUT`]; a non-zero exit is reported in the
/// [`ExecResult`].
pub async fn exec(cmd: &str) -> XcvrResult<ExecResult> {
    exec_timeout(cmd, DEFAULT_COMMAND_TIMEOUT).await
}

/// Executes a shell command, killing it if it runs longer than `limit`.
pub async fn exec_timeout(cmd: &str, limit: Duration) -> XcvrResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(limit, child).await {
        Ok(output) => output.map_err(|e| XcvrError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?,
        Err(_) => {
            tracing::warn!(
                command = %cmd,
                timeout_ms = limit.as_millis() as u64,
                "Command timed out, killed"
            );
            return Err(XcvrError::ShellTimeout {
                command: cmd.to_string(),
                timeout_ms: limit.as_millis() as u64,
            });
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let result = ExecResult {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if result.success() {
        tracing::trace!(command = %cmd, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a shell command and returns its stdout, failing on non-zero exit.
pub async fn exec_checked(cmd: &str) -> XcvrResult<String> {
    exec_checked_timeout(cmd, DEFAULT_COMMAND_TIMEOUT).await
}

/// [`exec_checked`] with an explicit limit.
pub async fn exec_checked_timeout(cmd: &str, limit: Duration) -> XcvrResult<String> {
    let result = exec_timeout(cmd, limit).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(XcvrError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}

/// Runs `cmd` piped through `grep` for `key`.
///
/// Returns the matching lines, or `None` when nothing matched or the
/// command failed.
pub async fn grep(cmd: &str, key: &str) -> XcvrResult<Option<String>> {
    let full = format!("{} | {} {}", cmd, GREP_CMD, shellquote(key));
    let result = exec(&full).await?;
    if result.success() && result.stdout.contains(key) {
        Ok(Some(result.stdout))
    } else {
        Ok(None)
    }
}
