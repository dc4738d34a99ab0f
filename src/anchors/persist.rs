//! Anchor file persistence.
//!
//! The on-disk format is a single line of `w,h` pairs separated by single
//! spaces, with a trailing space and no newline, using default `f64`
//! formatting. Detectors that consume anchor files expect exactly this
//! shape, so the writer never reformats values.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::BoxShape;
use crate::error::AnchorkitError;

/// What to do when the target anchor file already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Refuse to touch an existing file.
    FailIfExists,
    /// Replace the file's content.
    Overwrite,
    /// Write to `name-1.ext`, `name-2.ext`, ... instead.
    AppendSuffix,
}

/// Renders a centroid set in the anchor file format.
pub fn format_anchors(centroids: &[BoxShape]) -> String {
    let mut out = String::new();
    for centroid in centroids {
        write!(out, "{},{} ", centroid.w, centroid.h).expect("write to string");
    }
    out
}

/// Writes a centroid set to `path` according to `policy`.
///
/// Returns the path actually written, which differs from `path` only under
/// [`OverwritePolicy::AppendSuffix`].
pub fn write_anchors(
    path: &Path,
    centroids: &[BoxShape],
    policy: OverwritePolicy,
) -> Result<PathBuf, AnchorkitError> {
    let target = match policy {
        OverwritePolicy::Overwrite => path.to_path_buf(),
        OverwritePolicy::FailIfExists => {
            if path.exists() {
                return Err(AnchorkitError::AnchorFileExists {
                    path: path.to_path_buf(),
                });
            }
            path.to_path_buf()
        }
        OverwritePolicy::AppendSuffix => next_free_path(path),
    };

    fs::write(&target, format_anchors(centroids)).map_err(AnchorkitError::Io)?;
    Ok(target)
}

/// Parses an anchor file back into a centroid set.
pub fn read_anchors(path: &Path) -> Result<Vec<BoxShape>, AnchorkitError> {
    let content = fs::read_to_string(path).map_err(AnchorkitError::Io)?;
    parse_anchors(&content, path)
}

/// Parses anchor file content from a string.
///
/// This helper is primarily useful for testing/fuzzing parse behavior
/// in-memory.
pub fn from_anchor_str(content: &str) -> Result<Vec<BoxShape>, AnchorkitError> {
    parse_anchors(content, Path::new("<memory>"))
}

fn parse_anchors(content: &str, path: &Path) -> Result<Vec<BoxShape>, AnchorkitError> {
    let mut anchors = Vec::new();
    for token in content.split_whitespace() {
        let (w_raw, h_raw) = token.split_once(',').ok_or_else(|| {
            AnchorkitError::AnchorFileParse {
                path: path.to_path_buf(),
                message: format!("expected 'w,h' pair, got '{token}'"),
            }
        })?;

        let w = parse_dim(w_raw, path)?;
        let h = parse_dim(h_raw, path)?;
        anchors.push(BoxShape::new(w, h));
    }

    if anchors.is_empty() {
        return Err(AnchorkitError::AnchorFileParse {
            path: path.to_path_buf(),
            message: "file contains no anchors".to_string(),
        });
    }

    Ok(anchors)
}

fn parse_dim(raw: &str, path: &Path) -> Result<f64, AnchorkitError> {
    raw.parse::<f64>()
        .map_err(|_| AnchorkitError::AnchorFileParse {
            path: path.to_path_buf(),
            message: format!("invalid dimension '{raw}'"),
        })
}

fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    for n in 1u32.. {
        let name = match &extension {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
    }

    unreachable!("suffix probe exhausted u32 range")
}
