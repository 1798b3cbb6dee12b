//! # Altformat
//!
//! An alternate-format derivative engine: given original images in a
//! repository, it produces AVIF and WebP derivatives of both the originals
//! and their thumbnails, so hosts can serve a modern format to clients that
//! accept it while keeping the originals untouched.
//!
//! # Architecture: Fallback Chain Over One Scratch File
//!
//! Every transform runs the same way:
//!
//! ```text
//! 1. Derive     source rel path  →  derivative rel path + zone
//! 2. Policy     destination exists and no overwrite?  →  done (skip)
//! 3. Encode     strategy chain writes into a scratch temp file
//! 4. Store      scratch  →  storage (temp-then-rename, race tolerant)
//! ```
//!
//! The encoding step walks a capability-gated chain of backends in fixed
//! order, and the first one that produces output wins:
//!
//! - [`strategy::cli`] — external `avifenc` / `cwebp` processes. Best
//!   quality-per-byte, but needs the binary installed and process execution
//!   enabled. Cannot resize, so thumbnails are fed a pre-resized
//!   intermediate.
//! - [`strategy::pipeline`] — the pure-Rust [`image`] crate. Decodes,
//!   resizes, and encodes in-process; also produces the lossless PNG
//!   intermediates the CLI strategy resizes through.
//! - [`strategy::codec`] — direct `ravif` / `webp` codec bindings, gated
//!   behind the `codec-avif` / `codec-webp` cargo features. The last resort
//!   when the imaging pipeline was built without the target writer.
//!
//! A backend that cannot run on this host is *unavailable* and skipped
//! silently; a backend that runs and fails is logged and the chain moves
//! on. Only when every backend is exhausted does the transform fail, and
//! even then as a reported outcome, not an error bubbling into the host.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`format`] | `TargetFormat` (AVIF, WebP): extensions, MIME types, storage dir names, accepted sources |
//! | [`source`] | `SourceImage` — the engine's read-only view of an original asset |
//! | [`naming`] | Pure derivation of derivative paths from source paths |
//! | [`config`] | `EngineConfig` from TOML: enabled formats, quality, encoder locations, exec and queue toggles |
//! | [`storage`] | `Storage` trait + filesystem implementation; public and thumb zones; race-tolerant store |
//! | [`exec`] | Bounded external process execution with an administrative disable gate |
//! | [`strategy`] | The `EncodingStrategy` trait and the three backends |
//! | [`transformer`] | Per-format orchestration: chain walking, overwrite policy, scratch lifecycle |
//! | [`jobs`] | Serializable `TransformJob` + queue for deferred conversion |
//! | [`purge`] | Derivative cleanup when a source is deleted |
//!
//! # Design Decisions
//!
//! ## Derivatives Are Best-Effort
//!
//! The original image always remains servable, so a failed transform is
//! never fatal. Transform entry points return a [`transformer::TransformOutcome`]
//! describing what happened; hosts decide whether to retry, queue, or
//! ignore. Errors only escape for programming-level problems such as
//! invalid repository paths.
//!
//! ## Capability Probes Over Configuration
//!
//! Whether a backend can run is probed, not declared: the CLI strategy
//! checks the executable bit and the exec gate, the pipeline strategy asks
//! the `image` crate whether the writer was compiled in, and the direct
//! codecs are cargo features. Configuration only supplies locations and
//! quality; it cannot claim a capability the build does not have.
//!
//! ## Sibling Derivative Trees
//!
//! Derivatives live under a per-format directory (`avif/`, `webp/`) that
//! mirrors the source tree, with the extension swapped. The mapping is pure
//! and idempotent, so any component that knows a source path can compute
//! its derivative paths without a database.

pub mod config;
pub mod exec;
pub mod format;
pub mod jobs;
pub mod naming;
pub mod purge;
pub mod source;
pub mod storage;
pub mod strategy;
pub mod transformer;
