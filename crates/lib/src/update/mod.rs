//! Update pipeline.
//!
//! One request runs download -> extract -> (optional) patch and leaves a
//! populated version directory in the bundle store. Activation is a separate
//! step the caller takes afterwards.
//!
//! The version is assembled in `<hash>.tmp/` and only renamed onto `<hash>/`
//! once it is complete, so a failed request never disturbs an installed copy.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::consts::{BUNDLE_FILENAME, BUNDLE_PATCH_SUFFIX, FULL_SUFFIX, PACKAGE_PATCH_SUFFIX};
use crate::events::EventSink;
use crate::fetch::archive::unpack_zip;
use crate::fetch::{Transport, TransportError};
use crate::patch::{ApplyError, FileOperationError, PatchError, apply_patch_archive};
use crate::store::{BundleStore, is_valid_hash};

/// What the downloaded archive is and what it is diffed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
  /// The archive is a complete version.
  FullDownload,
  /// The archive is a diff against the bundle embedded in the package.
  PatchFromPackage,
  /// The archive is a diff against a previously downloaded version.
  PatchFromBundle { origin_hash: String },
}

impl UpdateKind {
  fn download_suffix(&self) -> &'static str {
    match self {
      UpdateKind::FullDownload => FULL_SUFFIX,
      UpdateKind::PatchFromPackage => PACKAGE_PATCH_SUFFIX,
      UpdateKind::PatchFromBundle { .. } => BUNDLE_PATCH_SUFFIX,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      UpdateKind::FullDownload => "full",
      UpdateKind::PatchFromPackage => "patch-from-package",
      UpdateKind::PatchFromBundle { .. } => "patch-from-bundle",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
  pub update_url: String,
  pub hash: String,
  pub kind: UpdateKind,
}

#[derive(Debug, Error)]
pub enum UpdateError {
  #[error("invalid update request: {0}")]
  Config(String),

  #[error("{0}")]
  Io(String),

  #[error(transparent)]
  Patch(#[from] PatchError),

  #[error(transparent)]
  FileOperation(#[from] FileOperationError),

  #[error(transparent)]
  Transport(#[from] TransportError),
}

impl From<ApplyError> for UpdateError {
  fn from(e: ApplyError) -> Self {
    match e {
      ApplyError::Patch(e) => UpdateError::Patch(e),
      ApplyError::FileOperation(e) => UpdateError::FileOperation(e),
    }
  }
}

impl UpdateError {
  /// Stable code reported to the host next to the message.
  pub fn code(&self) -> &'static str {
    match self {
      UpdateError::Config(_) => "CONFIG_ERROR",
      UpdateError::Io(_) => "IO_ERROR",
      UpdateError::Patch(_) => "PATCH_ERROR",
      UpdateError::FileOperation(_) => "FILE_OPERATION_ERROR",
      UpdateError::Transport(_) => "TRANSPORT_ERROR",
    }
  }
}

fn validate(request: &UpdateRequest) -> Result<(), UpdateError> {
  if request.update_url.is_empty() {
    return Err(UpdateError::Config("updateUrl is required".to_string()));
  }
  if request.hash.is_empty() {
    return Err(UpdateError::Config("hash is required".to_string()));
  }
  if !is_valid_hash(&request.hash) {
    return Err(UpdateError::Config(format!("hash {:?} is not a valid version name", request.hash)));
  }
  if let UpdateKind::PatchFromBundle { origin_hash } = &request.kind {
    if origin_hash.is_empty() {
      return Err(UpdateError::Config("originHash is required".to_string()));
    }
    if !is_valid_hash(origin_hash) {
      return Err(UpdateError::Config(format!("originHash {:?} is not a valid version name", origin_hash)));
    }
    if origin_hash == &request.hash {
      return Err(UpdateError::Config(format!("originHash {:?} must differ from hash", origin_hash)));
    }
  }
  Ok(())
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T, UpdateError>
where
  F: FnOnce() -> Result<T, UpdateError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| UpdateError::Io(format!("{} task failed: {}", what, e)))?
}

fn clear_dir(dir: &Path) -> Result<(), UpdateError> {
  if dir.exists() {
    fs::remove_dir_all(dir).map_err(|e| UpdateError::Io(format!("failed to clear {}: {}", dir.display(), e)))?;
  }
  Ok(())
}

fn extract(archive: &Path, staging: &Path) -> Result<(), UpdateError> {
  if staging.exists() {
    debug!(path = %staging.display(), "removing stale staging directory");
  }
  clear_dir(staging)?;

  let unpacked = unpack_zip(archive, staging).map_err(|e| UpdateError::Io(format!("failed to extract archive: {}", e)));

  if let Err(e) = fs::remove_file(archive) {
    debug!(path = %archive.display(), error = %e, "could not remove downloaded archive");
  }
  unpacked.map(|_| ())
}

/// Replace `version_dir` with the completed staging directory.
fn promote(staging: &Path, version_dir: &Path) -> Result<(), UpdateError> {
  if version_dir.exists() {
    debug!(path = %version_dir.display(), "replacing existing version directory");
  }
  clear_dir(version_dir)?;
  fs::rename(staging, version_dir).map_err(|e| {
    UpdateError::Io(format!(
      "failed to move {} to {}: {}",
      staging.display(),
      version_dir.display(),
      e
    ))
  })
}

fn assemble(
  archive: &Path,
  staging: &Path,
  version_dir: &Path,
  baseline: Option<(PathBuf, PathBuf)>,
) -> Result<(), UpdateError> {
  extract(archive, staging)?;
  if let Some((baseline_bundle, baseline_dir)) = baseline {
    apply_patch_archive(staging, &baseline_bundle, &baseline_dir)?;
  }
  promote(staging, version_dir)
}

/// Run one update request. Returns the populated version directory.
pub async fn run_update<T: Transport>(
  config: &UpdaterConfig,
  transport: &T,
  events: &EventSink,
  request: &UpdateRequest,
) -> Result<PathBuf, UpdateError> {
  validate(request)?;

  let store = BundleStore::new(config.root_dir.clone());
  store
    .ensure_root()
    .map_err(|e| UpdateError::Io(format!("failed to create store root {}: {}", store.root().display(), e)))?;

  let hash = request.hash.as_str();
  let archive = store.download_path(hash, request.kind.download_suffix());
  let version_dir = store.version_dir(hash);

  info!(hash, kind = request.kind.as_str(), url = %request.update_url, "starting update");

  transport
    .download(&request.update_url, &archive, &mut |received, total| {
      events.emit_progress(hash, received, total)
    })
    .await?;

  let baseline = match &request.kind {
    UpdateKind::FullDownload => None,
    UpdateKind::PatchFromPackage => Some((config.embedded_bundle.clone(), config.embedded_assets_dir.clone())),
    UpdateKind::PatchFromBundle { origin_hash } => Some((
      store.version_dir(origin_hash).join(BUNDLE_FILENAME),
      store.version_dir(origin_hash),
    )),
  };

  let staging = store.staging_dir(hash);
  let result = {
    let (staging, version_dir) = (staging.clone(), version_dir.clone());
    blocking("assemble", move || assemble(&archive, &staging, &version_dir, baseline)).await
  };
  if let Err(e) = result {
    if let Err(clean) = clear_dir(&staging) {
      debug!(path = %staging.display(), error = %clean, "could not remove staging directory");
    }
    return Err(e);
  }

  info!(hash, kind = request.kind.as_str(), "update ready");
  Ok(version_dir)
}
