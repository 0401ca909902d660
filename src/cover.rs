//! Cover art detection
//!
//! Cover identifiers hash the cover's *path*, not its bytes. Rescanning the
//! same directory yields the same identifier, which is what keeps cover rows
//! stable across repeated scans.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::models::Cover;

/// Number of hex characters kept from the path digest
pub const COVER_ID_LEN: usize = 16;

/// Derive the cover identifier for a cover file path
pub fn cover_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(COVER_ID_LEN);
    hex
}

/// Probe `dir` for the first existing file among `candidates`.
///
/// Names compare ASCII case-insensitively, the same way
/// [`ScanConfig::is_cover_name`](crate::config::ScanConfig::is_cover_name)
/// keeps cover files out of the song candidates.
pub fn detect_cover<S: AsRef<str>>(dir: &Path, candidates: &[S]) -> Option<Cover> {
    let mut listing: Option<Vec<PathBuf>> = None;
    candidates.iter().find_map(|name| {
        let name = name.as_ref();
        let exact = dir.join(name);
        let path = if exact.is_file() {
            exact
        } else {
            listing
                .get_or_insert_with(|| regular_files(dir))
                .iter()
                .find(|p| {
                    p.file_name()
                        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(name))
                })?
                .clone()
        };

        log::trace!("Detected cover {:?}", path);
        Some(Cover {
            id: cover_id(&path),
            path,
        })
    })
}

/// Regular files directly inside `dir`, sorted by name; unreadable entries
/// are left out
fn regular_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}
