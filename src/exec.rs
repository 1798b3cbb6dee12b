//! Bounded external process execution.
//!
//! Process-based encoding strategies go through [`ShellRunner`], which
//! enforces the administrative `allow_exec` gate, builds argv directly (no
//! shell, no interpolation of untrusted strings), discards stdout, and
//! captures stderr for diagnostics. The child is always waited on — a failed
//! or killed encoder never leaves a zombie behind.

use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExecError {
    /// Process execution is administratively disabled. Callers treat this as
    /// "backend unavailable", never as a failure.
    #[error("process execution is disabled")]
    Disabled,
    /// The process could not be started at all (missing binary, permissions).
    /// Also classified as unavailable rather than failed.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    /// The process started but could not be waited on.
    #[error("failed to collect output of {binary}: {source}")]
    Wait {
        binary: String,
        source: std::io::Error,
    },
}

/// Outcome of a completed child process.
#[derive(Debug)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external encoder binaries, honoring the config's `allow_exec` gate.
#[derive(Debug, Clone, Copy)]
pub struct ShellRunner {
    enabled: bool,
}

impl ShellRunner {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Execute `binary` with `args`, waiting for completion. Stdout is
    /// discarded; stderr travels back in the output for failure logs.
    pub fn run<I, S>(&self, binary: &Path, args: I) -> Result<ExecOutput, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        if !self.enabled {
            return Err(ExecError::Disabled);
        }

        debug!(binary = %binary.display(), "spawning encoder process");

        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExecError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        debug!(binary = %binary.display(), exit_code, "encoder process finished");

        Ok(ExecOutput { exit_code, stderr })
    }
}

/// Whether `path` points at an existing file this process may execute.
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
