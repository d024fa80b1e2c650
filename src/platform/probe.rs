//! Timeout-guarded access to external tools and OS sensor files.
//!
//! Every invocation has an enforced deadline. Children are spawned with
//! `kill_on_drop`, so an expired deadline or a dropped tick kills them.
//! Synchronous kernel queries (sysinfo, sysfs, the battery API) go through
//! [`blocking`] so a hung file system only stalls a pool thread.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::capabilities::{CapabilityProfile, Tool};
use crate::core::system_monitor::UnavailableReason;

/// Captured output of a finished program.
#[derive(Debug, Clone)]
pub struct ProgramOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProgramOutput {
    /// Stdout if not blank, else stderr. Some tools print versions on stderr.
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Probe {
    timeout: Duration,
}

impl Probe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run an optional tool and return its stdout.
    ///
    /// Fails with `ToolMissing` when the capability profile does not list the
    /// tool, without spawning anything.
    pub async fn run(
        &self,
        caps: &CapabilityProfile,
        tool: Tool,
        args: &[&str],
    ) -> Result<String, UnavailableReason> {
        if !caps.has(tool) {
            return Err(UnavailableReason::ToolMissing);
        }

        let output = self.run_program(tool.binary(), args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            log::debug!(
                "{} {:?} exited with failure: {}",
                tool.binary(),
                args,
                output.stderr.trim()
            );
            Err(classify_stderr(&output.stderr))
        }
    }

    /// Run any program (e.g. a browser binary found on disk).
    pub async fn run_program<P: AsRef<OsStr>>(
        &self,
        program: P,
        args: &[&str],
    ) -> Result<ProgramOutput, UnavailableReason> {
        let mut cmd = Command::new(program.as_ref());
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => UnavailableReason::ToolMissing,
            _ => UnavailableReason::from(&e),
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProgramOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(UnavailableReason::from(&e)),
            Err(_elapsed) => {
                log::debug!(
                    "{:?} timed out after {:?}",
                    program.as_ref(),
                    self.timeout
                );
                Err(UnavailableReason::Timeout)
            }
        }
    }

    /// Run a PowerShell snippet without profile loading.
    pub async fn powershell(
        &self,
        caps: &CapabilityProfile,
        script: &str,
    ) -> Result<String, UnavailableReason> {
        self.run(caps, Tool::PowerShell, &["-NoProfile", "-Command", script])
            .await
    }
}

fn classify_stderr(stderr: &str) -> UnavailableReason {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied")
        || lower.contains("operation not permitted")
        || lower.contains("access is denied")
        || lower.contains("requires elevation")
    {
        UnavailableReason::PermissionDenied
    } else {
        UnavailableReason::QueryFailed
    }
}

/// Run a synchronous OS query on tokio's blocking pool.
///
/// A query that panics comes back as `QueryFailed`. A query that hangs
/// keeps its pool thread, while the caller's deadline still fires.
pub async fn blocking<T, F>(query: F) -> Result<T, UnavailableReason>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(query).await.map_err(|e| {
        log::warn!("Blocking query failed: {}", e);
        UnavailableReason::QueryFailed
    })
}

/// Read a small text file such as a sysfs or procfs attribute, trimmed.
pub fn read_trimmed<P: AsRef<Path>>(path: P) -> Result<String, UnavailableReason> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(UnavailableReason::QueryFailed)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Read and parse a numeric sensor file.
pub fn read_number<P: AsRef<Path>, T: std::str::FromStr>(path: P) -> Result<T, UnavailableReason> {
    read_trimmed(path)?
        .parse::<T>()
        .map_err(|_| UnavailableReason::QueryFailed)
}
