//! Storage collaborator boundary.
//!
//! The engine never writes derivatives into place itself; it hands a
//! finished scratch file to a [`Storage`] implementation together with a
//! zone and a zone-relative destination path. The trait mirrors the host
//! repository's primitives: existence check, atomic store, batch purge, and
//! empty-directory cleanup.
//!
//! A destination that already exists is an expected outcome, not an error —
//! two concurrent transforms of the same source may race to store, and the
//! loser must see [`StoreOutcome::AlreadyExists`] rather than a failure.
//!
//! [`FsStorage`] is the plain-filesystem implementation: the public zone is
//! the repository root, the thumb zone lives under `thumb/`, and stores go
//! through a same-directory temp file plus rename so readers never observe a
//! half-written derivative.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A named storage area of the host repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Full-size derivatives, alongside the originals.
    Public,
    /// Thumbnail-size derivatives.
    Thumb,
}

impl Zone {
    pub fn name(self) -> &'static str {
        match self {
            Zone::Public => "public",
            Zone::Thumb => "thumb",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a successful [`Storage::store`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// The destination already held a derivative and overwrite was off.
    /// Benign; callers treat it as success.
    AlreadyExists,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid destination path: {0}")]
    InvalidPath(String),
}

/// Host repository storage operations the engine consumes.
pub trait Storage {
    /// Whether a file exists at `rel` inside `zone`. Cheap, read-only.
    fn exists(&self, zone: Zone, rel: &str) -> bool;

    /// Move the bytes at `scratch` to `rel` inside `zone`. Must be atomic
    /// with respect to readers and must report an existing destination as
    /// [`StoreOutcome::AlreadyExists`] when `overwrite` is false.
    fn store(
        &self,
        scratch: &Path,
        zone: Zone,
        rel: &str,
        overwrite: bool,
    ) -> Result<StoreOutcome, StorageError>;

    /// File names directly inside `rel_dir`. A missing directory yields an
    /// empty list.
    fn list_dir(&self, zone: Zone, rel_dir: &str) -> Result<Vec<String>, StorageError>;

    /// Delete the given files. Missing entries are not an error.
    fn purge_batch(&self, zone: Zone, rels: &[String]) -> Result<(), StorageError>;

    /// Remove `rel_dir` and any emptied ancestors, if they are empty.
    fn clean_dir(&self, zone: Zone, rel_dir: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed storage rooted at a repository directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn zone_root(&self, zone: Zone) -> PathBuf {
        match zone {
            Zone::Public => self.root.clone(),
            Zone::Thumb => self.root.join("thumb"),
        }
    }

    /// Absolute path of a zone-relative location. Rejects traversal out of
    /// the zone.
    pub fn local_path(&self, zone: Zone, rel: &str) -> Result<PathBuf, StorageError> {
        if rel.is_empty()
            || rel.starts_with('/')
            || rel.split('/').any(|part| part == ".." || part.is_empty())
        {
            return Err(StorageError::InvalidPath(rel.to_string()));
        }
        Ok(self.zone_root(zone).join(rel))
    }
}

impl Storage for FsStorage {
    fn exists(&self, zone: Zone, rel: &str) -> bool {
        self.local_path(zone, rel)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn store(
        &self,
        scratch: &Path,
        zone: Zone,
        rel: &str,
        overwrite: bool,
    ) -> Result<StoreOutcome, StorageError> {
        let dest = self.local_path(zone, rel)?;

        let parent = dest
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(rel.to_string()))?;
        std::fs::create_dir_all(parent)?;

        // Stage under a unique name next to the destination so the final
        // rename stays on one filesystem and concurrent stores of the same
        // derivative never share a staging path.
        let staging = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(parent)?;
        std::fs::copy(scratch, staging.path())?;

        if overwrite {
            staging.persist(&dest).map_err(|e| StorageError::Io(e.error))?;
            debug!(zone = %zone, rel, "stored derivative");
            return Ok(StoreOutcome::Stored);
        }

        // No-clobber rename: an existing destination, whether pre-existing
        // or stored by a concurrent call that won the race, is benign.
        match staging.persist_noclobber(&dest) {
            Ok(_) => {
                debug!(zone = %zone, rel, "stored derivative");
                Ok(StoreOutcome::Stored)
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(StoreOutcome::AlreadyExists)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    fn list_dir(&self, zone: Zone, rel_dir: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.local_path(zone, rel_dir)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn purge_batch(&self, zone: Zone, rels: &[String]) -> Result<(), StorageError> {
        for rel in rels {
            let path = self.local_path(zone, rel)?;
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(zone = %zone, rel, "purged derivative"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn clean_dir(&self, zone: Zone, rel_dir: &str) -> Result<(), StorageError> {
        let zone_root = self.zone_root(zone);
        let mut dir = self.local_path(zone, rel_dir)?;
        // Walk upward removing empty directories; stop at the first
        // non-empty one or at the zone root.
        while dir.starts_with(&zone_root) && dir != zone_root {
            match std::fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(_) => break,
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }
}
