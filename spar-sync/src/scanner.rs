//! Local build output scanning.
//!
//! Recursively walks the public root and produces every entry with a path
//! relative to the root, normalised to forward slashes. Symbolic links are
//! not followed and do not appear in the output.

use std::collections::BTreeSet;
use std::path::Path;

use spar_core::{LocalAsset, ObjectKey};

use crate::error::{scan_err, SyncError};

/// Walk `root` and return every directory and regular file beneath it,
/// sorted by relative path.
///
/// Fails if the root is missing or is not a directory. Also fails when a
/// directory in the tree cannot be read or an entry name is not UTF-8.
pub fn scan_tree(root: &Path) -> Result<Vec<LocalAsset>, SyncError> {
    let meta = std::fs::metadata(root).map_err(|e| scan_err(root, e))?;
    if !meta.is_dir() {
        return Err(scan_err(
            root,
            std::io::Error::other("public root is not a directory"),
        ));
    }

    let mut assets = Vec::new();
    walk_dir(root, root, &mut assets)?;
    assets.sort();
    Ok(assets)
}

/// The publishable subset of a scan: regular files only.
pub fn publishable(assets: &[LocalAsset]) -> BTreeSet<ObjectKey> {
    assets
        .iter()
        .filter(|a| !a.is_directory)
        .map(LocalAsset::key)
        .collect()
}

fn walk_dir(root: &Path, current: &Path, assets: &mut Vec<LocalAsset>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(current).map_err(|e| scan_err(current, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| scan_err(current, e))?;
        let path = entry.path();
        // `file_type` does not traverse symlinks.
        let file_type = entry.file_type().map_err(|e| scan_err(&path, e))?;

        if file_type.is_symlink() {
            tracing::debug!(path = %path.display(), "skipping symlink");
            continue;
        }

        let rel_path = path
            .strip_prefix(root)
            .map_err(|e| scan_err(&path, std::io::Error::other(e)))?;
        let rel_str = rel_path
            .to_str()
            .ok_or_else(|| {
                scan_err(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "file name is not valid UTF-8",
                    ),
                )
            })?
            .replace('\\', "/");

        if file_type.is_dir() {
            assets.push(LocalAsset::directory(rel_str));
            walk_dir(root, &path, assets)?;
        } else if file_type.is_file() {
            assets.push(LocalAsset::file(rel_str));
        }
    }

    Ok(())
}
