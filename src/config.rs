//! Engine configuration.
//!
//! Loaded from a single TOML file. Config files are sparse — every key is
//! optional and overrides a stock default. Unknown keys are rejected to
//! catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # Allow spawning external encoder processes (avifenc, cwebp).
//! allow_exec = true
//!
//! # Push transforms onto a job queue instead of converting inline.
//! convert_in_jobs = false
//!
//! # Formats to generate derivatives in.
//! formats = ["avif", "webp"]
//!
//! [avif]
//! quality = 23              # avifenc cq-level (0-63, lower is better); the
//!                           # in-process encoders map it onto their own scale
//! # encoder = "/usr/bin/avifenc"
//!
//! [webp]
//! quality = 80
//! # encoder = "/usr/bin/cwebp"
//! ```
//!
//! Each format's quality value is expressed in its CLI encoder's scale
//! (avifenc cq-level, cwebp percent); strategies using a backend with a
//! different scale translate via [`Quality::avif_percent`] so the same
//! configured number targets the same visual quality everywhere.

use crate::format::TargetFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Lossy encoding quality knob (0-100). Clamped on construction and on
/// deserialization; the meaning of the number belongs to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The AVIF knob is an avifenc `cq-level` (0-63, lower is better). The
    /// in-process AVIF encoders take a 0-100 percentage where higher is
    /// better; map between the scales so one configured number targets the
    /// same visual quality on every backend.
    pub fn avif_percent(self) -> u8 {
        let cq = self.0.min(63);
        (u16::from(63 - cq) * 100 / 63) as u8
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Ok(Quality::new(raw))
    }
}

/// Per-format settings: quality knob and optional CLI encoder binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    pub quality: Quality,
    /// Path to the format's command-line encoder. When unset, the CLI
    /// strategy reports itself unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder: Option<PathBuf>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            quality: Quality::new(80),
            encoder: None,
        }
    }
}

/// Engine configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Whether spawning external encoder processes is permitted at all.
    /// When false, every process-based strategy is unavailable (not failed).
    pub allow_exec: bool,
    /// Convert via the job queue instead of inline where the caller offers
    /// the choice. The engine itself behaves identically on both paths.
    pub convert_in_jobs: bool,
    /// Target formats to generate derivatives in, in order.
    pub formats: Vec<TargetFormat>,
    pub avif: FormatConfig,
    pub webp: FormatConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_exec: true,
            convert_in_jobs: false,
            formats: TargetFormat::ALL.to_vec(),
            avif: FormatConfig {
                // avifenc cq-level scale; 23 is visually lossless territory.
                quality: Quality::new(23),
                encoder: None,
            },
            webp: FormatConfig {
                quality: Quality::new(80),
                encoder: None,
            },
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the stock defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Settings for one target format.
    pub fn format(&self, format: TargetFormat) -> &FormatConfig {
        match format {
            TargetFormat::Avif => &self.avif,
            TargetFormat::Webp => &self.webp,
        }
    }

    /// Stock config with every option documented, for `gen-config`.
    pub fn stock_toml() -> &'static str {
        r#"# altformat configuration
# All options are optional - defaults shown below

# Allow spawning external encoder processes (avifenc, cwebp).
allow_exec = true

# Push transforms onto a job queue instead of converting inline.
convert_in_jobs = false

# Formats to generate derivatives in.
formats = ["avif", "webp"]

[avif]
quality = 23              # avifenc cq-level (0-63, lower is better); the
                          # in-process encoders map it onto their own scale
# encoder = "/usr/bin/avifenc"

[webp]
quality = 80
# encoder = "/usr/bin/cwebp"
"#
    }
}
