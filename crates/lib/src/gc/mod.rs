//! Bundle store garbage collection.
//!
//! Removes every top-level store entry except the current version. This is
//! best-effort: a deletion failure only costs disk space, so it is logged and
//! the sweep carries on.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::store::BundleStore;

#[derive(Debug, Default, serde::Serialize)]
pub struct GcStats {
  pub entries_scanned: usize,
  pub entries_deleted: usize,
  pub entries_failed: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct GcResult {
  pub stats: GcStats,
  pub kept: Option<String>,
  pub deleted_paths: Vec<PathBuf>,
}

fn entry_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
  if path.is_dir() && !path.is_symlink() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

/// Delete every entry under the store root whose name is not `keep`.
///
/// Store metadata (state directory, lock file) is never touched. With
/// `keep = None` every version is removed. Never fails: an unreadable root
/// yields an empty result.
pub fn collect_garbage(store: &BundleStore, keep: Option<&str>, dry_run: bool) -> GcResult {
  let mut result = GcResult {
    kept: keep.map(str::to_string),
    ..Default::default()
  };

  let entries = match fs::read_dir(store.root()) {
    Ok(entries) => entries,
    Err(e) => {
      debug!(root = %store.root().display(), error = %e, "store root not readable, nothing to collect");
      return result;
    }
  };

  for entry in entries.flatten() {
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().to_string();

    if BundleStore::is_metadata_entry(&name) {
      continue;
    }

    result.stats.entries_scanned += 1;

    if keep == Some(name.as_str()) {
      continue;
    }

    let size = entry_size(&path);
    debug!(path = %path.display(), "removing stale store entry");

    if dry_run {
      result.stats.entries_deleted += 1;
      result.stats.bytes_freed += size;
      result.deleted_paths.push(path);
      continue;
    }

    match remove_entry(&path) {
      Ok(()) => {
        result.stats.entries_deleted += 1;
        result.stats.bytes_freed += size;
        result.deleted_paths.push(path);
      }
      Err(e) => {
        result.stats.entries_failed += 1;
        warn!(path = %path.display(), error = %e, "failed to delete store entry");
      }
    }
  }

  info!(
    kept = keep.unwrap_or(""),
    deleted = result.stats.entries_deleted,
    bytes_freed = result.stats.bytes_freed,
    dry_run,
    "garbage collection complete"
  );

  result
}
