//! Derivative cleanup on source deletion.
//!
//! When a source image is removed from the host repository its derivatives
//! become orphans. [`purge_source`] removes, for every enabled format, the
//! public-zone derivative plus every thumbnail derivative of the source in
//! the thumb zone (any width), and then prunes directories the removals
//! emptied. Missing derivatives are not errors: a purge is a statement
//! about the desired end state, and some formats may never have been
//! produced.

use crate::config::EngineConfig;
use crate::format::TargetFormat;
use crate::naming;
use crate::storage::{Storage, StorageError, Zone};
use std::path::Path;
use tracing::{debug, info};

/// What a purge pass removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PurgeReport {
    /// Public-zone derivative paths that were handed to the storage layer.
    pub purged: Vec<String>,
    /// Thumb-zone derivative paths that were found and purged.
    pub thumb_purged: Vec<String>,
}

/// Remove every enabled format's derivatives of `rel_path` in both zones
/// and clean up emptied directories.
pub fn purge_source<S: Storage>(
    config: &EngineConfig,
    storage: &S,
    rel_path: &str,
) -> Result<PurgeReport, StorageError> {
    let paths: Vec<String> = config
        .formats
        .iter()
        .map(|format| naming::original_rel(*format, rel_path))
        .collect();
    if paths.is_empty() {
        return Ok(PurgeReport::default());
    }

    debug!(source = rel_path, count = paths.len(), "purging derivatives");
    storage.purge_batch(Zone::Public, &paths)?;
    for derived in &paths {
        if let Some(dir) = Path::new(derived).parent().and_then(Path::to_str) {
            storage.clean_dir(Zone::Public, dir)?;
        }
    }

    let mut thumb_purged = Vec::new();
    for format in &config.formats {
        thumb_purged.extend(purge_thumbs(storage, *format, rel_path)?);
    }

    info!(
        source = rel_path,
        purged = paths.len(),
        thumbs = thumb_purged.len(),
        "derivatives purged"
    );
    Ok(PurgeReport {
        purged: paths,
        thumb_purged,
    })
}

/// Purge every thumbnail derivative of `rel_path` in one format. Thumbnail
/// widths are not recorded anywhere, so the thumb directory is listed and
/// matched by name.
fn purge_thumbs<S: Storage>(
    storage: &S,
    format: TargetFormat,
    rel_path: &str,
) -> Result<Vec<String>, StorageError> {
    // `<fmt>/[parent/]<width>px-<basename swapped>`; the directory part is
    // the same for every width.
    let sample = naming::thumb_rel(format, rel_path, 0);
    let Some((dir, sample_name)) = sample.rsplit_once('/') else {
        return Ok(Vec::new());
    };
    let Some(suffix) = sample_name.strip_prefix("0") else {
        return Ok(Vec::new());
    };

    let matches: Vec<String> = storage
        .list_dir(Zone::Thumb, dir)?
        .into_iter()
        .filter(|name| {
            name.strip_suffix(suffix)
                .is_some_and(|w| !w.is_empty() && w.bytes().all(|b| b.is_ascii_digit()))
        })
        .map(|name| format!("{dir}/{name}"))
        .collect();

    if !matches.is_empty() {
        storage.purge_batch(Zone::Thumb, &matches)?;
    }
    storage.clean_dir(Zone::Thumb, dir)?;
    Ok(matches)
}
