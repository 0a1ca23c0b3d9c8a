//! Updater configuration from flags and environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use hotpatch_lib::UpdaterConfig;
use hotpatch_lib::platform::paths::{normalize, store_root};
use hotpatch_lib::store_lock::{LockMode, StoreLock};

#[derive(Args, Debug)]
pub struct AppArgs {
  /// Bundle store root [default: $XDG_DATA_HOME/hotpatch]
  #[arg(long, global = true, env = "HOTPATCH_ROOT")]
  pub root: Option<PathBuf>,

  /// Installed package version
  #[arg(long, global = true, env = "HOTPATCH_PACKAGE_VERSION")]
  pub package_version: Option<String>,

  /// Bundle shipped with the package
  #[arg(long, global = true, env = "HOTPATCH_EMBEDDED_BUNDLE", default_value = "index.bundlejs")]
  pub embedded_bundle: PathBuf,

  /// Resource directory shipped with the package
  #[arg(long, global = true, env = "HOTPATCH_EMBEDDED_ASSETS", default_value = "assets")]
  pub embedded_assets: PathBuf,

  /// Package build time, reported by `info`
  #[arg(long, global = true, env = "HOTPATCH_BUILD_TIME", default_value = "")]
  pub build_time: String,
}

impl AppArgs {
  pub fn root_dir(&self) -> PathBuf {
    normalize(&self.root.clone().unwrap_or_else(store_root))
  }

  pub fn config(&self) -> Result<UpdaterConfig> {
    let package_version = self
      .package_version
      .clone()
      .context("package version is required (--package-version or HOTPATCH_PACKAGE_VERSION)")?;

    let config = UpdaterConfig::new(package_version, self.embedded_bundle.clone(), self.embedded_assets.clone())
      .with_root(self.root_dir())
      .with_build_time(self.build_time.clone());
    debug!(root = %config.root_dir.display(), package_version = %config.package_version, "updater config");
    Ok(config)
  }

  /// Exclusive store lock for commands that write to the store.
  pub fn lock(&self, command: &str) -> Result<StoreLock> {
    StoreLock::acquire(&self.root_dir(), LockMode::Exclusive, command).context("Failed to acquire store lock")
  }
}
