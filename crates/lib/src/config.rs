//! Updater configuration.
//!
//! Everything the updater needs to know about the installed application:
//! where the store lives, which package version is installed, and where the
//! embedded bundle and its resources are.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::platform::paths::store_root;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
  /// Root of the bundle store. One subdirectory per version hash.
  pub root_dir: PathBuf,
  /// Version of the installed application package.
  pub package_version: String,
  /// Build time of the installed package, reported to the host as-is.
  #[serde(default)]
  pub build_time: String,
  /// Bundle shipped inside the installed package. Ultimate fallback.
  pub embedded_bundle: PathBuf,
  /// Resource directory shipped inside the installed package, used as the
  /// copy source when patching against the package.
  pub embedded_assets_dir: PathBuf,
}

impl UpdaterConfig {
  /// Configuration rooted at the default store location.
  pub fn new(package_version: impl Into<String>, embedded_bundle: PathBuf, embedded_assets_dir: PathBuf) -> Self {
    Self {
      root_dir: store_root(),
      package_version: package_version.into(),
      build_time: String::new(),
      embedded_bundle,
      embedded_assets_dir,
    }
  }

  pub fn with_root(mut self, root_dir: PathBuf) -> Self {
    self.root_dir = root_dir;
    self
  }

  pub fn with_build_time(mut self, build_time: impl Into<String>) -> Self {
    self.build_time = build_time.into();
    self
  }
}
