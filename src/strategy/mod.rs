//! Encoding strategies.
//!
//! One strategy per backend: a process-spawned CLI encoder ([`cli`]), the
//! full imaging pipeline on the `image` crate ([`pipeline`]), and the
//! lightweight direct-codec fallback ([`codec`]). The transformer tries its
//! chain strictly in order and takes the first strategy that is both
//! available on this host and succeeds.
//!
//! Availability ([`EncodingStrategy::is_available`]) is a cheap host probe:
//! binary present and executable, codec compiled in. An unavailable backend
//! is an expected condition and is skipped silently; a backend that ran and
//! produced nothing is a failure worth a warning.

pub mod cli;
pub mod codec;
pub mod pipeline;

use crate::config::Quality;
use crate::format::TargetFormat;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    /// The backend cannot run on this host (missing binary, execution
    /// disabled, codec not compiled in). Skipped silently by the chain.
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The backend ran but produced no usable output.
    #[error("{0}")]
    Failed(String),
}

impl StrategyError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StrategyError::Unavailable(_))
    }
}

/// One encode attempt: read `source`, write an encoded derivative to `out`.
#[derive(Debug)]
pub struct EncodeRequest<'a> {
    pub format: TargetFormat,
    /// Image to encode. May be a pre-resized intermediate rather than the
    /// original source.
    pub source: &'a Path,
    /// Scratch destination for the encoded bytes.
    pub out: &'a Path,
    /// Resize-by-width request. `None` when encoding at source size (either
    /// a full-size derivative or an already pre-resized intermediate).
    pub width: Option<u32>,
    /// Opaque quality knob from configuration.
    pub quality: Quality,
}

/// A backend-specific encoding path.
pub trait EncodingStrategy: Send + Sync {
    /// Stable identity for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this backend can run on the current host. Cheap and
    /// side-effect-free; consulted before every attempt and by
    /// `Transformer::can_transform`.
    fn is_available(&self) -> bool;

    /// Whether `encode` honors `EncodeRequest::width` itself. Strategies
    /// that cannot resize are only handed pre-resized intermediates.
    fn supports_resize(&self) -> bool;

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), StrategyError>;

    /// Resize `source` into `out` without changing its format, for use as
    /// the input of a resize-incapable strategy. Only resize-capable
    /// strategies implement this.
    fn pre_resize(&self, source: &Path, width: u32, out: &Path) -> Result<(), StrategyError> {
        let _ = (source, width, out);
        Err(StrategyError::Unavailable(format!(
            "{} cannot pre-resize",
            self.name()
        )))
    }
}

/// Shared strategy handle. The chain is iterated concurrently by parallel
/// transform calls, so strategies are stateless behind `Arc`.
pub type StrategyRef = Arc<dyn EncodingStrategy>;
