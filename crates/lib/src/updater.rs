//! Host-facing facade.
//!
//! `Updater` bundles configuration, transport, progress events and the
//! version state behind the operations a host application calls.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::UpdaterConfig;
use crate::events::{DownloadProgress, EventSink};
use crate::fetch::{DefaultTransport, Transport};
use crate::gc::{GcResult, collect_garbage};
use crate::rollback::RollbackController;
use crate::state::{BlockUpdate, Marker, StateError, VersionRecord, VersionStore};
use crate::store::BundleStore;
use crate::update::{UpdateError, UpdateKind, UpdateRequest, run_update};

/// Host hook invoked after a version is activated by `reload_update`.
pub trait ReloadHost: Send + Sync {
  fn request_reload(&self, bundle: &Path);
}

/// Snapshot of updater state handed to the host at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateConstants {
  pub download_root_dir: PathBuf,
  pub package_version: String,
  pub current_version: Option<String>,
  pub build_time: String,
  pub is_first_time: bool,
  pub is_rolled_back: bool,
  /// The bundle this process loaded came from the store, not the package.
  pub is_using_downloaded_bundle: bool,
  pub block_update: Option<BlockUpdate>,
  pub uuid: Option<String>,
}

pub struct Updater<T: Transport = DefaultTransport> {
  config: UpdaterConfig,
  transport: T,
  events: EventSink,
  store: BundleStore,
  state: Mutex<VersionStore>,
  rollback: RollbackController,
  host: Option<Box<dyn ReloadHost>>,
  using_downloaded: AtomicBool,
}

impl Updater<DefaultTransport> {
  pub fn new(config: UpdaterConfig) -> Self {
    Self::with_transport(config, DefaultTransport::default())
  }
}

impl<T: Transport> Updater<T> {
  pub fn with_transport(config: UpdaterConfig, transport: T) -> Self {
    let store = BundleStore::new(config.root_dir.clone());
    let state = VersionStore::under_root(&config.root_dir, config.package_version.clone());
    let rollback = RollbackController::new(state.clone(), store.clone(), config.embedded_bundle.clone());
    Self {
      config,
      transport,
      events: EventSink::new(),
      store,
      state: Mutex::new(state),
      rollback,
      host: None,
      using_downloaded: AtomicBool::new(false),
    }
  }

  pub fn with_reload_host(mut self, host: impl ReloadHost + 'static) -> Self {
    self.host = Some(Box::new(host));
    self
  }

  pub fn config(&self) -> &UpdaterConfig {
    &self.config
  }

  pub fn store(&self) -> &BundleStore {
    &self.store
  }

  /// Every state mutation happens under this guard.
  fn state(&self) -> MutexGuard<'_, VersionStore> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Subscribe to download progress.
  pub fn subscribe(&self) -> broadcast::Receiver<DownloadProgress> {
    self.events.subscribe()
  }

  pub async fn download_update(&self, update_url: &str, hash: &str) -> Result<PathBuf, UpdateError> {
    self.run(update_url, hash, UpdateKind::FullDownload).await
  }

  pub async fn download_patch_from_package(&self, update_url: &str, hash: &str) -> Result<PathBuf, UpdateError> {
    self.run(update_url, hash, UpdateKind::PatchFromPackage).await
  }

  pub async fn download_patch_from_bundle(
    &self,
    update_url: &str,
    hash: &str,
    origin_hash: &str,
  ) -> Result<PathBuf, UpdateError> {
    let kind = UpdateKind::PatchFromBundle {
      origin_hash: origin_hash.to_string(),
    };
    self.run(update_url, hash, kind).await
  }

  async fn run(&self, update_url: &str, hash: &str, kind: UpdateKind) -> Result<PathBuf, UpdateError> {
    let request = UpdateRequest {
      update_url: update_url.to_string(),
      hash: hash.to_string(),
      kind,
    };
    run_update(&self.config, &self.transport, &self.events, &request).await
  }

  /// Make `hash` the version loaded on the next start. The version must have
  /// been downloaded already.
  pub fn set_need_update(&self, hash: &str) -> Result<VersionRecord, StateError> {
    if !self.store.is_loadable(hash) {
      return Err(StateError::BundleNotFound(hash.to_string()));
    }
    self.state().activate(hash)
  }

  /// Activate `hash` and ask the host to reload into it.
  pub fn reload_update(&self, hash: &str) -> Result<PathBuf, StateError> {
    self.set_need_update(hash)?;
    let bundle = self.store.bundle_path(hash);
    match &self.host {
      Some(host) => {
        host.request_reload(&bundle);
        self.using_downloaded.store(true, Ordering::Relaxed);
      }
      None => warn!(hash, "no reload host attached, new version loads on next start"),
    }
    Ok(bundle)
  }

  /// Confirm the running version booted. Everything but that version is
  /// removed from the store afterwards.
  pub fn mark_success(&self) -> Result<Option<VersionRecord>, StateError> {
    let state = self.state();
    let record = state.mark_success()?;
    if let Some(record) = &record {
      info!(current = %record.current_version, "version confirmed");
      self.collect(Some(&record.current_version));
    }
    Ok(record)
  }

  pub fn set_block_update(&self, until: i64, reason: &str) -> Result<(), StateError> {
    self.state().set_block_update(until, reason)
  }

  pub fn set_uuid(&self, uuid: &str) -> Result<(), StateError> {
    self.state().set_uuid(uuid)
  }

  /// Boot-time entry point.
  pub fn resolve_bundle_to_load(&self) -> PathBuf {
    let _state = self.state();
    let bundle = self.rollback.resolve_bundle_to_load();
    self
      .using_downloaded
      .store(bundle != self.config.embedded_bundle, Ordering::Relaxed);
    bundle
  }

  /// Report updater state and consume the one-shot boot markers.
  pub fn constants(&self) -> UpdateConstants {
    let state = self.state();
    let current_version = state
      .read()
      .map(|r| r.current_version)
      .filter(|hash| !hash.is_empty());

    let first_time = state.consume_marker(Marker::FirstTime);
    let rolled_back = state.consume_marker(Marker::RolledBack);
    let package_updated = state.consume_marker(Marker::PackageUpdated);
    if rolled_back.value || package_updated.value {
      self.collect(current_version.as_deref());
    }

    UpdateConstants {
      download_root_dir: self.config.root_dir.clone(),
      package_version: self.config.package_version.clone(),
      current_version,
      build_time: self.config.build_time.clone(),
      is_first_time: first_time.value,
      is_rolled_back: rolled_back.value,
      is_using_downloaded_bundle: self.using_downloaded.load(Ordering::Relaxed),
      block_update: state.block_update(),
      uuid: state.uuid(),
    }
  }

  /// Remove every version except `keep`.
  pub fn gc(&self, keep: Option<&str>, dry_run: bool) -> GcResult {
    collect_garbage(&self.store, keep, dry_run)
  }

  fn collect(&self, keep: Option<&str>) {
    let result = collect_garbage(&self.store, keep, false);
    if result.stats.entries_failed > 0 {
      warn!(failed = result.stats.entries_failed, "some versions could not be removed");
    }
  }
}
