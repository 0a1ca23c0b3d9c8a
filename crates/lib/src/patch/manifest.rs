//! Copy/delete manifest shipped with patch archives, and its reconciliation
//! against a freshly patched version directory.
//!
//! ```json
//! {
//!   "copies": { "assets/new.png": "assets/old.png" },
//!   "deletes": ["assets/unused.png"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchManifest {
  /// Destination path (relative to the new version) -> source path (relative
  /// to the baseline resource directory).
  #[serde(default)]
  pub copies: BTreeMap<String, String>,
  /// Paths relative to the new version directory.
  #[serde(default, deserialize_with = "path_set")]
  pub deletes: BTreeSet<String>,
}

/// `deletes` is normally an array, but older archives ship it as an object
/// whose keys are the paths.
fn path_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    List(Vec<String>),
    Keys(BTreeMap<String, serde_json::Value>),
  }

  Ok(match Raw::deserialize(deserializer)? {
    Raw::List(paths) => paths.into_iter().collect(),
    Raw::Keys(map) => map.into_keys().collect(),
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
  ReadManifest,
  Copy,
  Delete,
}

impl fmt::Display for FileOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FileOp::ReadManifest => write!(f, "read manifest"),
      FileOp::Copy => write!(f, "copy"),
      FileOp::Delete => write!(f, "delete"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOpFailure {
  pub op: FileOp,
  pub path: PathBuf,
  pub message: String,
}

/// One or more manifest operations failed. Files written before the failure
/// stay in place.
#[derive(Debug, Error)]
pub struct FileOperationError {
  pub failures: Vec<FileOpFailure>,
}

impl fmt::Display for FileOperationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} file operation(s) failed", self.failures.len())?;
    if let Some(first) = self.failures.first() {
      write!(f, ", first: {} {}: {}", first.op, first.path.display(), first.message)?;
    }
    Ok(())
  }
}

impl FileOperationError {
  fn single(op: FileOp, path: &Path, message: impl ToString) -> Self {
    Self {
      failures: vec![FileOpFailure {
        op,
        path: path.to_path_buf(),
        message: message.to_string(),
      }],
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
  pub copied: usize,
  pub deleted: usize,
}

impl PatchManifest {
  /// Load a manifest. A missing file is an empty manifest.
  pub fn load(path: &Path) -> Result<Self, FileOperationError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no manifest in patch, nothing to reconcile");
        return Ok(Self::default());
      }
      Err(e) => return Err(FileOperationError::single(FileOp::ReadManifest, path, e)),
    };
    serde_json::from_str(&content).map_err(|e| FileOperationError::single(FileOp::ReadManifest, path, e))
  }
}

/// Join `rel` onto `base`, refusing anything that would escape `base`.
fn join_within(base: &Path, rel: &str) -> Option<PathBuf> {
  let rel_path = Path::new(rel);
  let mut out = base.to_path_buf();
  let mut pushed = false;
  for component in rel_path.components() {
    match component {
      Component::Normal(part) => {
        out.push(part);
        pushed = true;
      }
      Component::CurDir => {}
      _ => return None,
    }
  }
  pushed.then_some(out)
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
  for entry in WalkDir::new(src) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

fn copy_entry(src: &Path, dst: &Path) -> io::Result<()> {
  if src.is_dir() {
    return copy_dir(src, dst);
  }
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(src, dst).map(|_| ())
}

fn delete_entry(path: &Path) -> io::Result<()> {
  let result = if path.is_dir() && !path.is_symlink() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  };
  match result {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

/// Apply `manifest` to `version_dir`.
///
/// Every copy runs before any delete: a delete target may still be needed as
/// a copy source when the baseline and the new version share a directory.
/// Failures are collected across both phases and reported together.
pub fn reconcile(
  manifest: &PatchManifest,
  baseline_dir: &Path,
  version_dir: &Path,
) -> Result<ReconcileStats, FileOperationError> {
  let mut stats = ReconcileStats::default();
  let mut failures = Vec::new();

  for (dest, source) in &manifest.copies {
    let (Some(src_path), Some(dst_path)) = (join_within(baseline_dir, source), join_within(version_dir, dest)) else {
      failures.push(FileOpFailure {
        op: FileOp::Copy,
        path: PathBuf::from(dest),
        message: format!("path escapes its directory: {} -> {}", source, dest),
      });
      continue;
    };

    match copy_entry(&src_path, &dst_path) {
      Ok(()) => stats.copied += 1,
      Err(e) => {
        warn!(from = %src_path.display(), to = %dst_path.display(), error = %e, "manifest copy failed");
        failures.push(FileOpFailure {
          op: FileOp::Copy,
          path: dst_path,
          message: format!("from {}: {}", src_path.display(), e),
        });
      }
    }
  }

  for rel in &manifest.deletes {
    let Some(path) = join_within(version_dir, rel) else {
      failures.push(FileOpFailure {
        op: FileOp::Delete,
        path: PathBuf::from(rel),
        message: "path escapes its directory".to_string(),
      });
      continue;
    };

    match delete_entry(&path) {
      Ok(()) => stats.deleted += 1,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "manifest delete failed");
        failures.push(FileOpFailure {
          op: FileOp::Delete,
          path,
          message: e.to_string(),
        });
      }
    }
  }

  if !failures.is_empty() {
    return Err(FileOperationError { failures });
  }

  info!(copied = stats.copied, deleted = stats.deleted, "manifest reconciled");
  Ok(stats)
}
