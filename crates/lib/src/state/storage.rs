//! State storage for the updater.
//!
//! # Storage Layout
//!
//! ```text
//! {root}/.state/
//! ├── version.json    # VersionRecord, absent when no downloaded version is active
//! └── flags.json      # one-shot markers and durable settings
//! ```
//!
//! Both documents are written to a temp file and renamed into place, so a
//! reader never sees a partial record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::consts::STATE_DIR;

use super::types::{BlockUpdate, Flags, Marker, MarkerRead, StateError, VersionRecord};

const VERSION_FILENAME: &str = "version.json";
const FLAGS_FILENAME: &str = "flags.json";

#[derive(Debug, Clone)]
pub struct VersionStore {
  /// Directory holding the state documents.
  base_path: PathBuf,
  /// Version of the installed package, stamped on every new record.
  package_version: String,
}

impl VersionStore {
  pub fn new(base_path: PathBuf, package_version: impl Into<String>) -> Self {
    Self {
      base_path,
      package_version: package_version.into(),
    }
  }

  /// State store living under a bundle store root.
  pub fn under_root(root: &Path, package_version: impl Into<String>) -> Self {
    Self::new(root.join(STATE_DIR), package_version)
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn package_version(&self) -> &str {
    &self.package_version
  }

  fn version_path(&self) -> PathBuf {
    self.base_path.join(VERSION_FILENAME)
  }

  fn flags_path(&self) -> PathBuf {
    self.base_path.join(FLAGS_FILENAME)
  }

  fn ensure_dir(&self) -> Result<(), StateError> {
    fs::create_dir_all(&self.base_path).map_err(StateError::CreateDir)
  }

  fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(StateError::Read(e)),
    };
    let value = serde_json::from_str(&content).map_err(StateError::Parse)?;
    Ok(Some(value))
  }

  fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StateError> {
    self.ensure_dir()?;

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let content = serde_json::to_string_pretty(value).map_err(StateError::Serialize)?;
    fs::write(&temp_path, &content).map_err(StateError::Write)?;
    fs::rename(&temp_path, path).map_err(StateError::Write)?;
    Ok(())
  }

  /// Read the active record.
  ///
  /// A missing, unreadable or malformed document reads as no record: boot
  /// must be able to fall back to the embedded bundle no matter what is on disk.
  pub fn read(&self) -> Option<VersionRecord> {
    match Self::load_json::<VersionRecord>(&self.version_path()) {
      Ok(record) => record,
      Err(e) => {
        warn!(path = %self.version_path().display(), error = %e, "ignoring unreadable version record");
        None
      }
    }
  }

  /// Replace the active record.
  pub fn write(&self, record: &VersionRecord) -> Result<(), StateError> {
    debug!(
      current = %record.current_version,
      last = %record.last_version,
      first_time = record.is_first_time,
      first_load_ok = record.is_first_load_ok,
      "writing version record"
    );
    self.save_json(&self.version_path(), record)
  }

  /// Remove the active record entirely.
  pub fn clear(&self) -> Result<(), StateError> {
    match fs::remove_file(self.version_path()) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(StateError::Write(e)),
    }
    info!("version record cleared");
    Ok(())
  }

  /// Make `hash` the active version, pending first-boot confirmation.
  ///
  /// The previous current version becomes the rollback target. Activating the
  /// version that is already current keeps the existing rollback target so
  /// the chain never points at itself.
  pub fn activate(&self, hash: &str) -> Result<VersionRecord, StateError> {
    let previous = self.read().filter(|r| r.package_version == self.package_version);

    let last_version = match previous {
      Some(prev) if prev.current_version == hash => prev.last_version,
      Some(prev) => prev.current_version,
      None => String::new(),
    };

    let record = VersionRecord {
      current_version: hash.to_string(),
      last_version,
      package_version: self.package_version.clone(),
      is_first_time: true,
      is_first_load_ok: false,
    };
    self.write(&record)?;

    info!(current = %record.current_version, last = %record.last_version, "version activated");
    Ok(record)
  }

  /// Confirm the active version booted and can be trusted.
  ///
  /// Returns the updated record, or `None` when no downloaded version is active.
  pub fn mark_success(&self) -> Result<Option<VersionRecord>, StateError> {
    let Some(mut record) = self.read() else {
      debug!("mark_success without an active record");
      return Ok(None);
    };

    record.is_first_time = false;
    record.is_first_load_ok = true;
    record.last_version.clear();
    self.write(&record)?;

    info!(current = %record.current_version, "version marked successful");
    Ok(Some(record))
  }

  fn load_flags(&self) -> Flags {
    match Self::load_json::<Flags>(&self.flags_path()) {
      Ok(flags) => flags.unwrap_or_default(),
      Err(e) => {
        warn!(error = %e, "ignoring unreadable flags");
        Flags::default()
      }
    }
  }

  fn update_flags(&self, f: impl FnOnce(&mut Flags)) -> Result<(), StateError> {
    let mut flags = self.load_flags();
    f(&mut flags);
    self.save_json(&self.flags_path(), &flags)
  }

  /// Raise a one-shot marker.
  pub fn set_marker(&self, marker: Marker) -> Result<(), StateError> {
    debug!(marker = marker.as_str(), "setting marker");
    self.update_flags(|flags| *flags.marker_mut(marker) = Some(true))
  }

  /// Read a marker and clear it.
  ///
  /// Failing to persist the cleared marker is logged and otherwise ignored.
  pub fn consume_marker(&self, marker: Marker) -> MarkerRead {
    let mut flags = self.load_flags();
    let slot = flags.marker_mut(marker);
    let Some(value) = slot.take() else {
      return MarkerRead {
        value: false,
        had_value: false,
      };
    };

    if let Err(e) = self.save_json(&self.flags_path(), &flags) {
      warn!(marker = marker.as_str(), error = %e, "failed to clear marker");
    }

    MarkerRead { value, had_value: true }
  }

  pub fn set_block_update(&self, until: i64, reason: impl Into<String>) -> Result<(), StateError> {
    let block = BlockUpdate {
      until,
      reason: reason.into(),
    };
    info!(until = block.until, reason = %block.reason, "blocking updates");
    self.update_flags(|flags| flags.block_update = Some(block))
  }

  pub fn block_update(&self) -> Option<BlockUpdate> {
    self.load_flags().block_update
  }

  pub fn set_uuid(&self, uuid: impl Into<String>) -> Result<(), StateError> {
    let uuid = uuid.into();
    self.update_flags(|flags| flags.uuid = Some(uuid))
  }

  pub fn uuid(&self) -> Option<String> {
    self.load_flags().uuid
  }
}
