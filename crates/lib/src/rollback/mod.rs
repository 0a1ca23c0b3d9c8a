//! Boot-time version resolution.
//!
//! Decides which bundle the host loads on this process start. A version that
//! was activated but never confirmed by `mark_success` before the next start
//! is distrusted and the previous trusted version takes its place.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::state::{Marker, VersionRecord, VersionStore};
use crate::store::BundleStore;

#[derive(Debug)]
pub struct RollbackController {
  state: VersionStore,
  store: BundleStore,
  embedded_bundle: PathBuf,
  /// Set once this process has seen its first boot of a fresh version, so a
  /// second resolve in the same process does not demote it.
  ignore_rollback: AtomicBool,
}

impl RollbackController {
  pub fn new(state: VersionStore, store: BundleStore, embedded_bundle: PathBuf) -> Self {
    Self {
      state,
      store,
      embedded_bundle,
      ignore_rollback: AtomicBool::new(false),
    }
  }

  pub fn ignore_rollback(&self) -> bool {
    self.ignore_rollback.load(Ordering::SeqCst)
  }

  /// Bundle path to load for this process. Never fails: the embedded bundle
  /// is the last resort.
  pub fn resolve_bundle_to_load(&self) -> PathBuf {
    let Some(record) = self.state.read() else {
      debug!("no active version, loading embedded bundle");
      return self.embedded_bundle.clone();
    };

    if record.package_version != self.state.package_version() {
      info!(
        recorded = %record.package_version,
        installed = %self.state.package_version(),
        "package version changed, discarding downloaded versions"
      );
      if let Err(e) = self.state.clear() {
        warn!(error = %e, "failed to clear version record");
      }
      if let Err(e) = self.state.set_marker(Marker::PackageUpdated) {
        warn!(error = %e, "failed to set package-updated marker");
      }
      return self.embedded_bundle.clone();
    }

    let need_rollback =
      (!self.ignore_rollback() && !record.is_first_time && !record.is_first_load_ok) || record.current_version.is_empty();

    let mut candidate = if need_rollback {
      warn!(current = %record.current_version, "version never confirmed a successful boot, rolling back");
      self.rollback(&record)
    } else {
      if record.is_first_time {
        self.ignore_rollback.store(true, Ordering::SeqCst);
        let mut flipped = record.clone();
        flipped.is_first_time = false;
        if let Err(e) = self.state.write(&flipped) {
          warn!(error = %e, "failed to persist first boot");
        }
        if let Err(e) = self.state.set_marker(Marker::FirstTime) {
          warn!(error = %e, "failed to set first-time marker");
        }
        info!(current = %record.current_version, "first boot of new version");
      }
      Some(record.current_version.clone())
    };

    let mut visited = HashSet::new();
    while let Some(hash) = candidate {
      if !visited.insert(hash.clone()) {
        warn!(hash = %hash, "version chain loops back on itself, discarding it");
        if let Err(e) = self.state.clear() {
          warn!(error = %e, "failed to clear version record");
        }
        break;
      }

      if self.store.is_loadable(&hash) {
        debug!(hash = %hash, "loading downloaded bundle");
        return self.store.bundle_path(&hash);
      }

      warn!(hash = %hash, "bundle missing for version, rolling back");
      let current = self
        .state
        .read()
        .filter(|r| r.current_version == hash)
        .unwrap_or_else(|| VersionRecord {
          current_version: hash.clone(),
          package_version: self.state.package_version().to_string(),
          ..Default::default()
        });
      candidate = self.rollback(&current);
    }

    debug!("no loadable version left, loading embedded bundle");
    self.embedded_bundle.clone()
  }

  /// Drop the current version in favour of the previous one.
  ///
  /// Returns the version now current, or `None` when the record was wiped
  /// because nothing older was left.
  fn rollback(&self, record: &VersionRecord) -> Option<String> {
    if record.last_version.is_empty() {
      info!(current = %record.current_version, "nothing to roll back to, clearing version record");
      if let Err(e) = self.state.clear() {
        warn!(error = %e, "failed to clear version record");
      }
      return None;
    }

    let rolled = VersionRecord {
      current_version: record.last_version.clone(),
      last_version: String::new(),
      package_version: record.package_version.clone(),
      is_first_time: false,
      is_first_load_ok: true,
    };
    if let Err(e) = self.state.write(&rolled) {
      warn!(error = %e, "failed to persist rollback");
    }
    if let Err(e) = self.state.set_marker(Marker::RolledBack) {
      warn!(error = %e, "failed to set rolled-back marker");
    }

    info!(from = %record.current_version, to = %rolled.current_version, "rolled back");
    Some(rolled.current_version)
  }
}
