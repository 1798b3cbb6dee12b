//! Per-format derivative transformer.
//!
//! A [`Transformer`] owns the fallback chain of encoding strategies for one
//! target format, the destination-path rules, and the exists/overwrite
//! policy. It is stateless across invocations and safe to call from
//! parallel workers: every call's scratch file, strategy selection, and
//! result are local to the call.
//!
//! Expected failure modes never escape as errors. A transform returns a
//! [`TransformOutcome`]; callers decide whether to retry, log, or queue a
//! background job. The only logging done here is a warning per failed
//! backend attempt and per non-benign store failure.

use crate::config::EngineConfig;
use crate::exec::ShellRunner;
use crate::format::TargetFormat;
use crate::naming;
use crate::source::SourceImage;
use crate::storage::{Storage, StoreOutcome, Zone};
use crate::strategy::cli::CliEncoder;
use crate::strategy::codec::DirectCodec;
use crate::strategy::pipeline::ImagePipeline;
use crate::strategy::{EncodeRequest, StrategyError, StrategyRef};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Outcome of one transform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// A derivative was encoded and stored.
    Created { zone: Zone, path: String },
    /// A usable derivative was already in place (pre-existing, or another
    /// call won the store race); nothing was done.
    AlreadyExists { zone: Zone, path: String },
    /// No strategy produced output, or storing failed. The message
    /// aggregates per-strategy diagnostics.
    Failed { message: String },
}

impl TransformOutcome {
    /// Whether a usable derivative exists after the call.
    pub fn is_success(&self) -> bool {
        !matches!(self, TransformOutcome::Failed { .. })
    }
}

/// Derivative producer for one target format.
pub struct Transformer<'a, S: Storage> {
    format: TargetFormat,
    config: &'a EngineConfig,
    storage: &'a S,
    strategies: Vec<StrategyRef>,
}

impl<'a, S: Storage> Transformer<'a, S> {
    /// Transformer with the default strategy chain: CLI encoder, image
    /// pipeline, direct codec — tried strictly in that order.
    pub fn new(format: TargetFormat, config: &'a EngineConfig, storage: &'a S) -> Self {
        let runner = ShellRunner::new(config.allow_exec);
        let strategies: Vec<StrategyRef> = vec![
            Arc::new(CliEncoder::new(
                format,
                config.format(format).encoder.clone(),
                runner,
            )),
            Arc::new(ImagePipeline::new(format)),
            Arc::new(DirectCodec::new(format)),
        ];
        Self::with_strategies(format, config, storage, strategies)
    }

    /// Transformer with an explicit chain. Used by tests and by hosts that
    /// need to restrict or reorder backends.
    pub fn with_strategies(
        format: TargetFormat,
        config: &'a EngineConfig,
        storage: &'a S,
        strategies: Vec<StrategyRef>,
    ) -> Self {
        Self {
            format,
            config,
            storage,
            strategies,
        }
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Whether this transformer can do anything with `source`: supported
    /// MIME type and at least one available backend. Cheap and
    /// side-effect-free; callers check this before queueing work.
    pub fn can_transform(&self, source: &SourceImage) -> bool {
        self.format.supports_mime(source.mime())
            && self.strategies.iter().any(|s| s.is_available())
    }

    /// Produce the full-resolution derivative in the public zone.
    pub fn transform_original(&self, source: &SourceImage, overwrite: bool) -> TransformOutcome {
        let rel = naming::original_rel(self.format, source.rel_path());
        self.transform_to(source, Zone::Public, rel, None, overwrite)
    }

    /// Produce a thumbnail-sized derivative in the thumb zone. A zero width
    /// means "transform the original".
    pub fn transform_thumbnail(
        &self,
        source: &SourceImage,
        width: u32,
        overwrite: bool,
    ) -> TransformOutcome {
        if width == 0 {
            return self.transform_original(source, overwrite);
        }
        let rel = naming::thumb_rel(self.format, source.rel_path(), width);
        self.transform_to(source, Zone::Thumb, rel, Some(width), overwrite)
    }

    fn transform_to(
        &self,
        source: &SourceImage,
        zone: Zone,
        rel: String,
        width: Option<u32>,
        overwrite: bool,
    ) -> TransformOutcome {
        if !self.format.supports_mime(source.mime()) {
            return TransformOutcome::Failed {
                message: format!(
                    "mime type {:?} is not supported for {} (supported: {})",
                    source.mime(),
                    self.format,
                    self.format.supported_sources().join(", ")
                ),
            };
        }

        debug!(format = %self.format, zone = %zone, out = rel, "derivative destination");

        if self.storage.exists(zone, &rel) && !overwrite {
            debug!(out = rel, "derivative exists, skipping transform");
            return TransformOutcome::AlreadyExists { zone, path: rel };
        }

        let scratch = match scratch_file(self.format) {
            Ok(f) => f,
            Err(e) => {
                return TransformOutcome::Failed {
                    message: format!("could not allocate scratch file: {e}"),
                };
            }
        };

        if let Err(message) = self.run_chain(source, width, &scratch) {
            return TransformOutcome::Failed { message };
        }

        match self.storage.store(scratch.path(), zone, &rel, overwrite) {
            Ok(StoreOutcome::Stored) => TransformOutcome::Created { zone, path: rel },
            // Another call stored the same derivative first. Benign.
            Ok(StoreOutcome::AlreadyExists) => TransformOutcome::AlreadyExists { zone, path: rel },
            Err(e) => {
                warn!(
                    source = source.rel_path(),
                    out = rel,
                    error = %e,
                    "could not store derivative"
                );
                TransformOutcome::Failed {
                    message: format!("could not store derivative at {rel}: {e}"),
                }
            }
        }
        // scratch (and any pre-resize intermediate) is removed on drop,
        // on every exit path.
    }

    /// Try each strategy in order until one writes a derivative into the
    /// scratch file. Returns the aggregated diagnostic on exhaustion.
    fn run_chain(
        &self,
        source: &SourceImage,
        width: Option<u32>,
        scratch: &NamedTempFile,
    ) -> Result<(), String> {
        let quality = self.config.format(self.format).quality;
        let mut attempts: Vec<String> = Vec::new();
        // One pre-resized intermediate per call, shared across fallback
        // attempts by resize-incapable strategies.
        let mut pre_resized = PreResized::Untried;

        for strategy in &self.strategies {
            let name = strategy.name();
            if !strategy.is_available() {
                attempts.push(format!("{name}: unavailable"));
                continue;
            }

            let (input, request_width): (PathBuf, Option<u32>) = match width {
                Some(w) if !strategy.supports_resize() => {
                    match self.pre_resize(source, w, &mut pre_resized) {
                        Some(path) => (path, None),
                        None => {
                            attempts.push(format!("{name}: skipped, resize needed but no resize-capable strategy is available"));
                            continue;
                        }
                    }
                }
                _ => (source.local_path().to_path_buf(), width),
            };

            let request = EncodeRequest {
                format: self.format,
                source: &input,
                out: scratch.path(),
                width: request_width,
                quality,
            };
            match strategy.encode(&request) {
                Ok(()) => {
                    debug!(strategy = name, "derivative encoded");
                    return Ok(());
                }
                Err(e) if e.is_unavailable() => {
                    debug!(strategy = name, reason = %e, "strategy unavailable");
                    attempts.push(format!("{name}: {e}"));
                }
                Err(e) => {
                    warn!(strategy = name, error = %e, "encoding backend failed");
                    attempts.push(format!("{name}: {e}"));
                }
            }
        }

        Err(format!(
            "no backend produced a {} derivative ({})",
            self.format,
            attempts.join("; ")
        ))
    }

    /// Produce (once) the resized intermediate for resize-incapable
    /// strategies, using the first available resize-capable strategy.
    fn pre_resize(
        &self,
        source: &SourceImage,
        width: u32,
        state: &mut PreResized,
    ) -> Option<PathBuf> {
        if let PreResized::Untried = state {
            *state = self.make_pre_resized(source, width);
        }
        match state {
            PreResized::Ready(file) => Some(file.path().to_path_buf()),
            _ => None,
        }
    }

    fn make_pre_resized(&self, source: &SourceImage, width: u32) -> PreResized {
        let Some(resizer) = self
            .strategies
            .iter()
            .find(|s| s.is_available() && s.supports_resize())
        else {
            return PreResized::Unavailable;
        };

        let file = match tempfile::Builder::new()
            .prefix("altformat-resize-")
            .suffix(".png")
            .tempfile()
        {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "could not allocate pre-resize intermediate");
                return PreResized::Unavailable;
            }
        };

        match resizer.pre_resize(source.local_path(), width, file.path()) {
            Ok(()) => {
                debug!(strategy = resizer.name(), width, "pre-resized source");
                PreResized::Ready(file)
            }
            Err(StrategyError::Unavailable(_)) => PreResized::Unavailable,
            Err(e) => {
                warn!(strategy = resizer.name(), error = %e, "pre-resize failed");
                PreResized::Unavailable
            }
        }
    }
}

enum PreResized {
    Untried,
    Unavailable,
    Ready(NamedTempFile),
}

fn scratch_file(format: TargetFormat) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("altformat-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use crate::strategy::tests::{RecordedCall, RecordingStrategy};
    use tempfile::TempDir;

    fn jpeg_source(tmp: &TempDir, rel: &str) -> SourceImage {
        let local = tmp.path().join("sources").join(rel);
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, b"jpeg").unwrap();
        SourceImage::new(rel, "image/jpeg", local)
    }

    fn transformer<'a>(
        config: &'a EngineConfig,
        storage: &'a FsStorage,
        strategies: Vec<StrategyRef>,
    ) -> Transformer<'a, FsStorage> {
        Transformer::with_strategies(TargetFormat::Avif, config, storage, strategies)
    }

    #[test]
    fn can_transform_requires_supported_mime() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy]);

        let gif = SourceImage::new("a.gif", "image/gif", tmp.path().join("a.gif"));
        assert!(!t.can_transform(&gif));

        let jpeg = jpeg_source(&tmp, "a.jpg");
        assert!(t.can_transform(&jpeg));
    }

    #[test]
    fn can_transform_false_when_every_strategy_unavailable() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let t = transformer(
            &config,
            &storage,
            vec![
                RecordingStrategy::unavailable("s1"),
                RecordingStrategy::unavailable("s2"),
            ],
        );

        let jpeg = jpeg_source(&tmp, "a.jpg");
        assert!(!t.can_transform(&jpeg));
    }

    #[test]
    fn original_goes_to_public_zone_with_swapped_extension() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_original(&source, false);

        assert_eq!(
            outcome,
            TransformOutcome::Created {
                zone: Zone::Public,
                path: "avif/photo.avif".to_string(),
            }
        );
        assert!(storage.exists(Zone::Public, "avif/photo.avif"));
        assert_eq!(strategy.encode_count(), 1);
    }

    #[test]
    fn thumbnail_goes_to_thumb_zone_with_width_prefix() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_thumbnail(&source, 320, false);

        assert_eq!(
            outcome,
            TransformOutcome::Created {
                zone: Zone::Thumb,
                path: "avif/320px-photo.avif".to_string(),
            }
        );
        // Resize-capable strategy receives the width directly.
        assert!(matches!(
            &strategy.calls()[..],
            [RecordedCall::Encode { width: Some(320), .. }]
        ));
        assert!(storage.exists(Zone::Thumb, "avif/320px-photo.avif"));
    }

    #[test]
    fn zero_width_thumbnail_is_original_transform() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_thumbnail(&source, 0, false);
        assert_eq!(
            outcome,
            TransformOutcome::Created {
                zone: Zone::Public,
                path: "avif/photo.avif".to_string(),
            }
        );
    }

    #[test]
    fn existing_destination_without_overwrite_invokes_zero_strategies() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        // Seed an existing derivative.
        let existing = tmp.path().join("existing.avif");
        std::fs::write(&existing, b"old").unwrap();
        storage
            .store(&existing, Zone::Public, "avif/photo.avif", false)
            .unwrap();

        let outcome = t.transform_original(&source, false);
        assert_eq!(
            outcome,
            TransformOutcome::AlreadyExists {
                zone: Zone::Public,
                path: "avif/photo.avif".to_string(),
            }
        );
        assert_eq!(strategy.encode_count(), 0);
    }

    #[test]
    fn existing_destination_with_overwrite_invokes_chain() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let existing = tmp.path().join("existing.avif");
        std::fs::write(&existing, b"old").unwrap();
        storage
            .store(&existing, Zone::Public, "avif/photo.avif", false)
            .unwrap();

        let outcome = t.transform_original(&source, true);
        assert!(matches!(outcome, TransformOutcome::Created { .. }));
        assert_eq!(strategy.encode_count(), 1);
    }

    #[test]
    fn failing_strategy_falls_through_to_next() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let first = RecordingStrategy::failing("s1", true);
        let second = RecordingStrategy::available("s2", true);
        let t = transformer(&config, &storage, vec![first.clone(), second.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_original(&source, false);

        assert!(matches!(outcome, TransformOutcome::Created { .. }));
        assert_eq!(first.encode_count(), 1);
        assert_eq!(second.encode_count(), 1);
    }

    #[test]
    fn unavailable_strategy_is_never_invoked() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let first = RecordingStrategy::unavailable("s1");
        let second = RecordingStrategy::available("s2", true);
        let t = transformer(&config, &storage, vec![first.clone(), second.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_original(&source, false);

        assert!(matches!(outcome, TransformOutcome::Created { .. }));
        assert_eq!(first.encode_count(), 0);
        assert_eq!(second.encode_count(), 1);
    }

    #[test]
    fn exhausted_chain_reports_each_attempt() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let first = RecordingStrategy::unavailable("cli-encoder");
        let second = RecordingStrategy::failing("pipeline", true);
        let t = transformer(&config, &storage, vec![first, second]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let TransformOutcome::Failed { message } = t.transform_original(&source, false) else {
            panic!("expected failure");
        };
        assert!(message.contains("cli-encoder: unavailable"), "{message}");
        assert!(message.contains("pipeline"), "{message}");
        // Nothing was stored.
        assert!(!storage.exists(Zone::Public, "avif/photo.avif"));
    }

    #[test]
    fn resize_incapable_strategy_gets_pre_resized_intermediate() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let cli = RecordingStrategy::available("cli", false);
        let resizer = RecordingStrategy::available("pipeline", true);
        let t = transformer(&config, &storage, vec![cli.clone(), resizer.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_thumbnail(&source, 320, false);

        assert!(matches!(outcome, TransformOutcome::Created { .. }));
        // The CLI strategy won, fed by the resizer's intermediate.
        assert!(matches!(
            &cli.calls()[..],
            [RecordedCall::Encode { width: None, .. }]
        ));
        assert_eq!(resizer.calls(), vec![RecordedCall::PreResize { width: 320 }]);
        assert_eq!(resizer.encode_count(), 0);
    }

    #[test]
    fn resize_without_any_resizer_fails_rather_than_emitting_full_size() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let cli = RecordingStrategy::available("cli", false);
        let t = transformer(&config, &storage, vec![cli.clone()]);

        let source = jpeg_source(&tmp, "photo.jpg");
        let outcome = t.transform_thumbnail(&source, 320, false);

        assert!(matches!(outcome, TransformOutcome::Failed { .. }));
        assert_eq!(cli.encode_count(), 0);
        assert!(!storage.exists(Zone::Thumb, "avif/320px-photo.avif"));
    }

    #[test]
    fn scratch_file_removed_after_success_and_failure() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));

        let ok = RecordingStrategy::available("ok", true);
        let t = transformer(&config, &storage, vec![ok.clone()]);
        let source = jpeg_source(&tmp, "photo.jpg");
        assert!(t.transform_original(&source, false).is_success());
        let [RecordedCall::Encode { out, .. }] = &ok.calls()[..] else {
            panic!("expected one encode");
        };
        assert!(!out.exists(), "scratch survived a successful transform");

        let failing = RecordingStrategy::failing("bad", true);
        let t = transformer(&config, &storage, vec![failing.clone()]);
        let source2 = jpeg_source(&tmp, "other.jpg");
        assert!(!t.transform_original(&source2, false).is_success());
        let [RecordedCall::Encode { out, .. }] = &failing.calls()[..] else {
            panic!("expected one encode");
        };
        assert!(!out.exists(), "scratch survived a failed transform");
    }

    #[test]
    fn unsupported_mime_fails_without_invoking_chain() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let storage = FsStorage::new(tmp.path().join("repo"));
        let strategy = RecordingStrategy::available("s1", true);
        let t = transformer(&config, &storage, vec![strategy.clone()]);

        let gif = SourceImage::new("a.gif", "image/gif", tmp.path().join("a.gif"));
        let outcome = t.transform_original(&gif, false);
        assert!(matches!(outcome, TransformOutcome::Failed { .. }));
        assert_eq!(strategy.encode_count(), 0);
    }
}
