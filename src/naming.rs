//! Derivative path derivation.
//!
//! Pure string functions mapping a source's repository-relative path to the
//! paths its derivatives are stored under. Derivatives live in a
//! per-format subdirectory of each zone:
//!
//! ```text
//! public: avif/2024/photo.avif           (full-size derivative)
//! thumb:  avif/2024/320px-photo.avif     (thumbnail-size derivative)
//! ```
//!
//! Repository-relative paths always use `/` separators; these functions never
//! touch the filesystem.

use crate::format::TargetFormat;

/// Swap the extension of the final path component for `ext`.
///
/// Idempotent: re-applying with the same extension leaves the path unchanged,
/// never double-appends. A component without an extension gets one appended;
/// dotfiles (leading dot, no other dot) are treated as extensionless.
pub fn swap_extension(rel: &str, ext: &str) -> String {
    let (dir, name) = match rel.rfind('/') {
        Some(i) => (&rel[..=i], &rel[i + 1..]),
        None => ("", rel),
    };
    let stem = match name.rfind('.') {
        // Leading dot only: dotfile, keep the whole name as the stem.
        Some(0) | None => name,
        Some(i) => &name[..i],
    };
    format!("{dir}{stem}.{ext}")
}

/// Zone-relative destination for the full-size derivative of a source.
///
/// `2024/photo.jpg` → `avif/2024/photo.avif` (public zone).
pub fn original_rel(format: TargetFormat, source_rel: &str) -> String {
    format!(
        "{}/{}",
        format.dir_name(),
        swap_extension(source_rel, format.extension())
    )
}

/// Zone-relative destination for a thumbnail-size derivative of a source.
///
/// The source's parent directories are preserved so same-named sources in
/// different directories cannot collide:
/// `2024/photo.jpg` at width 320 → `avif/2024/320px-photo.avif` (thumb zone).
pub fn thumb_rel(format: TargetFormat, source_rel: &str, width: u32) -> String {
    let (dir, name) = match source_rel.rfind('/') {
        Some(i) => (&source_rel[..=i], &source_rel[i + 1..]),
        None => ("", source_rel),
    };
    format!(
        "{}/{}{}px-{}",
        format.dir_name(),
        dir,
        width,
        swap_extension(name, format.extension())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_basic() {
        assert_eq!(swap_extension("photo.jpg", "avif"), "photo.avif");
        assert_eq!(swap_extension("photo.jpeg", "webp"), "photo.webp");
    }

    #[test]
    fn swap_preserves_directories() {
        assert_eq!(
            swap_extension("2024/trip/photo.jpg", "avif"),
            "2024/trip/photo.avif"
        );
    }

    #[test]
    fn swap_ignores_dots_in_directories() {
        assert_eq!(swap_extension("dir.v2/photo", "avif"), "dir.v2/photo.avif");
    }

    #[test]
    fn swap_only_last_segment() {
        assert_eq!(swap_extension("archive.tar.gz", "avif"), "archive.tar.avif");
    }

    #[test]
    fn swap_appends_when_no_extension() {
        assert_eq!(swap_extension("photo", "avif"), "photo.avif");
    }

    #[test]
    fn swap_trailing_dot() {
        assert_eq!(swap_extension("photo.", "avif"), "photo.avif");
    }

    #[test]
    fn swap_dotfile_treated_as_extensionless() {
        assert_eq!(swap_extension(".hidden", "avif"), ".hidden.avif");
    }

    // Idempotence over 0–3 existing dot-separated extension segments.
    #[test]
    fn swap_is_idempotent() {
        for input in ["photo", "photo.jpg", "photo.tar.gz", "photo.a.b.c", "x/y/photo.jpg"] {
            let once = swap_extension(input, "avif");
            let twice = swap_extension(&once, "avif");
            assert_eq!(once, twice, "double-apply changed {input:?}");
            assert!(once.ends_with(".avif"));
            assert!(!once.ends_with(".avif.avif"));
        }
    }

    #[test]
    fn original_rel_prefixes_format_dir() {
        assert_eq!(original_rel(TargetFormat::Avif, "photo.jpg"), "avif/photo.avif");
        assert_eq!(
            original_rel(TargetFormat::Webp, "2024/photo.jpg"),
            "webp/2024/photo.webp"
        );
    }

    #[test]
    fn thumb_rel_inserts_width_prefix() {
        assert_eq!(
            thumb_rel(TargetFormat::Avif, "photo.jpg", 320),
            "avif/320px-photo.avif"
        );
        assert_eq!(
            thumb_rel(TargetFormat::Avif, "2024/photo.jpg", 320),
            "avif/2024/320px-photo.avif"
        );
    }

    #[test]
    fn thumb_rel_already_converted_name_is_stable() {
        let once = thumb_rel(TargetFormat::Webp, "photo.jpg", 150);
        assert_eq!(once, "webp/150px-photo.webp");
        // Swapping the extension of an already-derived name must not stack.
        assert_eq!(swap_extension(&once, "webp"), once);
    }
}
