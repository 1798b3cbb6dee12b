//! Source image descriptions.
//!
//! A [`SourceImage`] is the engine's read-only view of an original asset in
//! the host repository: a stable repository-relative path (used to derive
//! derivative paths), a MIME type, and a local filesystem path the bytes can
//! be read from. The engine never writes to or moves the source.

use std::path::{Path, PathBuf};

/// A source image borrowed from the host repository for the duration of a
/// transform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Repository-relative path with `/` separators, e.g. `2024/photo.jpg`.
    rel_path: String,
    /// MIME type, e.g. `image/jpeg`.
    mime: String,
    /// Local path the source bytes can be read from.
    local: PathBuf,
}

impl SourceImage {
    pub fn new(rel_path: impl Into<String>, mime: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            rel_path: rel_path.into(),
            mime: mime.into(),
            local: local.into(),
        }
    }

    /// Build a source from a local file, inferring the MIME type from the
    /// extension. Returns `None` for extensions the engine does not track.
    pub fn from_local(rel_path: impl Into<String>, local: impl Into<PathBuf>) -> Option<Self> {
        let local = local.into();
        let mime = mime_from_extension(&local)?;
        Some(Self {
            rel_path: rel_path.into(),
            mime: mime.to_string(),
            local,
        })
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Final path component of the repository-relative path.
    pub fn name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }
}

/// MIME type for a file extension, for the source types the engine tracks.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_final_component() {
        let src = SourceImage::new("2024/trip/photo.jpg", "image/jpeg", "/repo/2024/trip/photo.jpg");
        assert_eq!(src.name(), "photo.jpg");

        let flat = SourceImage::new("photo.jpg", "image/jpeg", "/repo/photo.jpg");
        assert_eq!(flat.name(), "photo.jpg");
    }

    #[test]
    fn from_local_infers_mime() {
        let src = SourceImage::from_local("a.png", "/repo/a.png").unwrap();
        assert_eq!(src.mime(), "image/png");
        assert_eq!(src.local_path(), Path::new("/repo/a.png"));
    }

    #[test]
    fn from_local_rejects_unknown_extensions() {
        assert!(SourceImage::from_local("a.gif", "/repo/a.gif").is_none());
        assert!(SourceImage::from_local("a", "/repo/a").is_none());
    }

    #[test]
    fn mime_lookup_is_case_insensitive() {
        assert_eq!(mime_from_extension(Path::new("x.JPG")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("x.JPeG")), Some("image/jpeg"));
    }
}
