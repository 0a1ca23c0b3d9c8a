use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The active version binding.
///
/// Persisted as one document and always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
  pub current_version: String,
  #[serde(default)]
  pub last_version: String,
  pub package_version: String,
  pub is_first_time: bool,
  pub is_first_load_ok: bool,
}

impl VersionRecord {
  /// A version is unverified between activation and its first confirmed boot.
  pub fn is_unverified(&self) -> bool {
    self.is_first_time && !self.is_first_load_ok
  }
}

/// One-shot markers. Reading one through [`VersionStore::consume_marker`]
/// clears it.
///
/// [`VersionStore::consume_marker`]: super::VersionStore::consume_marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
  /// A rollback happened during boot-time resolution.
  RolledBack,
  /// The active version is booting for the first time.
  FirstTime,
  /// The installed package changed and the version record was wiped.
  PackageUpdated,
}

impl Marker {
  pub fn as_str(self) -> &'static str {
    match self {
      Marker::RolledBack => "rolled_back",
      Marker::FirstTime => "first_time",
      Marker::PackageUpdated => "package_updated",
    }
  }
}

/// Result of consuming a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRead {
  pub value: bool,
  /// Whether the marker had been stored at all.
  pub had_value: bool,
}

/// Host-requested pause of update checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUpdate {
  /// Unix timestamp in seconds until which updates are blocked.
  pub until: i64,
  pub reason: String,
}

/// Markers plus durable settings, persisted next to the version record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rolled_back: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_time: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub package_updated: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub block_update: Option<BlockUpdate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uuid: Option<String>,
}

impl Flags {
  pub(crate) fn marker_mut(&mut self, marker: Marker) -> &mut Option<bool> {
    match marker {
      Marker::RolledBack => &mut self.rolled_back,
      Marker::FirstTime => &mut self.first_time,
      Marker::PackageUpdated => &mut self.package_updated,
    }
  }
}

/// Errors from reading or writing the state documents.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read state: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse state: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("bundle version {0} not found")]
  BundleNotFound(String),
}
