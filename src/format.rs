//! Target output formats for derivative generation.
//!
//! Each [`TargetFormat`] knows its canonical file extension (which doubles as
//! the storage subdirectory name derivatives live under), its MIME type, and
//! the set of source MIME types it accepts. A `Transformer` is constructed
//! per format; adding a format means adding a variant here plus its encoder
//! arms in the strategy modules.

use serde::{Deserialize, Serialize};

/// An output format the engine can produce derivatives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Avif,
    Webp,
}

impl TargetFormat {
    /// All formats the engine knows about, in default processing order.
    pub const ALL: [TargetFormat; 2] = [TargetFormat::Avif, TargetFormat::Webp];

    /// Canonical file extension, without a dot.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Avif => "avif",
            TargetFormat::Webp => "webp",
        }
    }

    /// Subdirectory name derivatives of this format are stored under,
    /// inside each zone (e.g. `avif/...`, `thumb/avif/...`).
    pub fn dir_name(self) -> &'static str {
        self.extension()
    }

    /// MIME type of produced derivatives.
    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Avif => "image/avif",
            TargetFormat::Webp => "image/webp",
        }
    }

    /// Source MIME types this format accepts.
    ///
    /// WebP sources are accepted for AVIF output but not the reverse:
    /// re-encoding WebP as WebP would be a no-op derivative.
    pub fn supported_sources(self) -> &'static [&'static str] {
        match self {
            TargetFormat::Avif => &["image/jpeg", "image/jpg", "image/png", "image/webp"],
            TargetFormat::Webp => &["image/jpeg", "image/jpg", "image/png"],
        }
    }

    /// Whether `mime` is an accepted source type for this format.
    pub fn supports_mime(self, mime: &str) -> bool {
        self.supported_sources().contains(&mime)
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
