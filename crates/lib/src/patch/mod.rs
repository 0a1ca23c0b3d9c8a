//! Patch engine.
//!
//! A patch archive, once extracted, holds the binary diff for the bundle
//! (`index.bundlejs.patch`) and the copy/delete manifest (`__diff.json`).
//! Applying it rebuilds the bundle from the baseline and then reconciles the
//! auxiliary files.

pub mod format;
pub mod manifest;

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{BUNDLE_FILENAME, DIFF_MANIFEST_FILENAME, PATCH_FILENAME};

pub use format::{PatchError, apply, diff};
pub use manifest::{FileOperationError, PatchManifest, ReconcileStats, reconcile};

#[derive(Debug, Error)]
pub enum ApplyError {
  #[error(transparent)]
  Patch(#[from] PatchError),

  #[error(transparent)]
  FileOperation(#[from] FileOperationError),
}

/// Turn an extracted patch archive in `version_dir` into a complete version.
///
/// * `baseline_bundle` - bundle the diff was computed against
/// * `baseline_dir` - resource directory manifest copies are sourced from
pub fn apply_patch_archive(
  version_dir: &Path,
  baseline_bundle: &Path,
  baseline_dir: &Path,
) -> Result<ReconcileStats, ApplyError> {
  let patch_file = version_dir.join(PATCH_FILENAME);
  let manifest_file = version_dir.join(DIFF_MANIFEST_FILENAME);

  info!(
    version_dir = %version_dir.display(),
    baseline = %baseline_bundle.display(),
    "applying patch archive"
  );

  format::apply(&patch_file, baseline_bundle, &version_dir.join(BUNDLE_FILENAME))?;

  let manifest = PatchManifest::load(&manifest_file)?;
  let stats = reconcile(&manifest, baseline_dir, version_dir)?;

  for leftover in [&patch_file, &manifest_file] {
    if let Err(e) = fs::remove_file(leftover) {
      debug!(path = %leftover.display(), error = %e, "could not remove patch leftover");
    }
  }

  Ok(stats)
}
