//! Process-spawned CLI encoder strategy (avifenc, cwebp).
//!
//! Fastest and smallest output when the binary is installed, but the
//! encoders cannot rescale: a thumbnail request is only served through a
//! pre-resized intermediate produced by a resize-capable strategy, which the
//! transformer arranges before calling in here.
//!
//! Argument lists are built deterministically from the request — no shell,
//! nothing interpolated. A missing or non-executable binary, or execution
//! being administratively disabled, makes the strategy unavailable; a
//! non-zero exit makes an attempt a failure, with stderr carried into the
//! diagnostic.

use super::{EncodeRequest, EncodingStrategy, StrategyError};
use crate::exec::{ExecError, ShellRunner, is_executable};
use crate::format::TargetFormat;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub struct CliEncoder {
    format: TargetFormat,
    binary: Option<PathBuf>,
    runner: ShellRunner,
}

impl CliEncoder {
    pub fn new(format: TargetFormat, binary: Option<PathBuf>, runner: ShellRunner) -> Self {
        Self {
            format,
            binary,
            runner,
        }
    }
}

/// Argument list for one encoder invocation.
///
/// avifenc runs in constrained-quality mode, tuned for SSIM, with all
/// worker threads; cwebp only needs the quality knob.
fn build_args(format: TargetFormat, quality: u8, input: &Path, output: &Path) -> Vec<OsString> {
    match format {
        TargetFormat::Avif => vec![
            "-a".into(),
            format!("cq-level={quality}").into(),
            "-j".into(),
            "all".into(),
            "--min".into(),
            "0".into(),
            "--max".into(),
            "63".into(),
            "-a".into(),
            "end-usage=q".into(),
            "-a".into(),
            "tune=ssim".into(),
            input.into(),
            output.into(),
        ],
        TargetFormat::Webp => vec![
            "-q".into(),
            quality.to_string().into(),
            "-quiet".into(),
            input.into(),
            "-o".into(),
            output.into(),
        ],
    }
}

impl EncodingStrategy for CliEncoder {
    fn name(&self) -> &'static str {
        match self.format {
            TargetFormat::Avif => "avifenc",
            TargetFormat::Webp => "cwebp",
        }
    }

    fn is_available(&self) -> bool {
        self.runner.is_enabled()
            && self
                .binary
                .as_deref()
                .is_some_and(is_executable)
    }

    fn supports_resize(&self) -> bool {
        false
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), StrategyError> {
        if request.width.is_some() {
            // The chain pre-resizes for this strategy; a width reaching here
            // means no resizer was available.
            return Err(StrategyError::Unavailable(format!(
                "{} cannot resize",
                self.name()
            )));
        }

        let binary = self
            .binary
            .as_deref()
            .ok_or_else(|| StrategyError::Unavailable(format!("no {} binary configured", self.name())))?;

        let args = build_args(self.format, request.quality.value(), request.source, request.out);

        let output = self.runner.run(binary, args).map_err(|e| match e {
            ExecError::Disabled | ExecError::Spawn { .. } => {
                StrategyError::Unavailable(e.to_string())
            }
            ExecError::Wait { .. } => StrategyError::Failed(e.to_string()),
        })?;

        if !output.success() {
            return Err(StrategyError::Failed(format!(
                "{} exited with code {}: {}",
                self.name(),
                output.exit_code,
                output.stderr
            )));
        }
        Ok(())
    }
}
