//! Deferred transform jobs.
//!
//! When `convert_in_jobs` is set, derivative production is pushed onto a
//! queue instead of running inline with the caller. A [`TransformJob`] is a
//! serializable description of one pending transform: it carries the source
//! identity and the transform parameters, never the transformer itself, so
//! it can cross a process boundary. Running a job performs exactly the same
//! work as the inline path.

use crate::config::EngineConfig;
use crate::format::TargetFormat;
use crate::source::SourceImage;
use crate::storage::Storage;
use crate::transformer::{TransformOutcome, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// One pending derivative transform, ready for serialization onto a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformJob {
    /// Repository-relative path of the source image.
    pub rel_path: String,
    /// MIME type of the source image.
    pub mime: String,
    /// Derivative format to produce.
    pub format: TargetFormat,
    /// Thumbnail width; `None` for a full-resolution derivative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Replace an existing derivative instead of skipping it.
    #[serde(default)]
    pub overwrite: bool,
}

impl TransformJob {
    /// Job for a full-resolution derivative.
    pub fn original(source: &SourceImage, format: TargetFormat, overwrite: bool) -> Self {
        Self {
            rel_path: source.rel_path().to_string(),
            mime: source.mime().to_string(),
            format,
            width: None,
            overwrite,
        }
    }

    /// Job for a thumbnail-sized derivative.
    pub fn thumbnail(
        source: &SourceImage,
        format: TargetFormat,
        width: u32,
        overwrite: bool,
    ) -> Self {
        Self {
            width: Some(width),
            ..Self::original(source, format, overwrite)
        }
    }

    /// Execute the job against the live configuration and storage. The
    /// source bytes are resolved under `source_root` at run time, so a job
    /// whose source was deleted while queued fails cleanly instead of
    /// encoding stale bytes.
    pub fn run<S: Storage>(
        &self,
        config: &EngineConfig,
        storage: &S,
        source_root: &Path,
    ) -> TransformOutcome {
        let local = source_root.join(&self.rel_path);
        if !local.is_file() {
            return TransformOutcome::Failed {
                message: format!("source {} no longer exists", self.rel_path),
            };
        }
        let source = SourceImage::new(&self.rel_path, &self.mime, local);
        let transformer = Transformer::new(self.format, config, storage);
        match self.width {
            Some(width) => transformer.transform_thumbnail(&source, width, self.overwrite),
            None => transformer.transform_original(&source, self.overwrite),
        }
    }
}

/// Transform jobs for every (source, format) pair the engine can actually
/// convert, in source order. Pairs failing `can_transform` (unsupported
/// MIME type, or no backend available for the format) are dropped here so
/// they are never queued or counted as failures. With a non-zero `width`,
/// each pair also gets a thumbnail job.
pub fn plan<S: Storage>(
    config: &EngineConfig,
    storage: &S,
    sources: &[SourceImage],
    formats: &[TargetFormat],
    width: Option<u32>,
    overwrite: bool,
) -> Vec<TransformJob> {
    let mut jobs = Vec::new();
    for source in sources {
        for &format in formats {
            let transformer = Transformer::new(format, config, storage);
            if !transformer.can_transform(source) {
                debug!(
                    source = source.rel_path(),
                    format = %format,
                    "skipping unconvertible source"
                );
                continue;
            }
            jobs.push(TransformJob::original(source, format, overwrite));
            if let Some(w) = width {
                if w > 0 {
                    jobs.push(TransformJob::thumbnail(source, format, w, overwrite));
                }
            }
        }
    }
    jobs
}

/// Destination for deferred transforms.
pub trait JobQueue: Send + Sync {
    fn push(&self, job: TransformJob);
}

/// In-process queue backed by a mutex-guarded deque. Suitable for the
/// bundled binary and for tests; hosts with an external job runner
/// implement [`JobQueue`] over their own transport.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<TransformJob>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<TransformJob> {
        self.pending.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    /// Run every queued job to completion, in order. Returns the outcomes.
    pub fn drain<S: Storage>(
        &self,
        config: &EngineConfig,
        storage: &S,
        source_root: &Path,
    ) -> Vec<TransformOutcome> {
        let mut outcomes = Vec::new();
        while let Some(job) = self.pop() {
            debug!(rel_path = job.rel_path, format = %job.format, "running queued transform");
            outcomes.push(job.run(config, storage, source_root));
        }
        outcomes
    }
}

impl JobQueue for MemoryQueue {
    fn push(&self, job: TransformJob) {
        self.pending.lock().unwrap().push_back(job);
    }
}
