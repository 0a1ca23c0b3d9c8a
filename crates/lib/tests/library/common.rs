//! Shared helpers for library integration tests.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hotpatch_lib::UpdaterConfig;
use hotpatch_lib::consts::BUNDLE_FILENAME;
use hotpatch_lib::fetch::{ProgressFn, Transport, TransportError};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const EMBEDDED: &[u8] = b"require('app').start({ build: 'embedded', features: ['a', 'b', 'c'] });";

/// Serves archives from memory, in two chunks, and remembers what was fetched.
#[derive(Clone, Default)]
pub struct MemoryTransport {
  archives: Arc<Mutex<HashMap<String, Vec<u8>>>>,
  pub fetched: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
  pub fn serve(&self, url: &str, entries: &[(&str, &[u8])]) {
    self.archives.lock().unwrap().insert(url.to_string(), zip_bytes(entries));
  }
}

impl Transport for MemoryTransport {
  async fn download(&self, url: &str, dest: &Path, on_progress: &mut ProgressFn<'_>) -> Result<u64, TransportError> {
    self.fetched.lock().unwrap().push(url.to_string());
    let body = self
      .archives
      .lock()
      .unwrap()
      .get(url)
      .cloned()
      .ok_or_else(|| TransportError::new(url, "HTTP 404"))?;

    let total = body.len() as u64;
    let half = body.len() / 2;
    on_progress(half as u64, Some(total));
    std::fs::write(dest, &body).map_err(|e| TransportError::new(url, e))?;
    on_progress(total, Some(total));
    Ok(total)
  }
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
  let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
  for (name, data) in entries {
    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
    writer.write_all(data).unwrap();
  }
  writer.finish().unwrap().into_inner()
}

/// An installed application: embedded bundle, embedded assets, empty store.
pub struct App {
  pub temp: TempDir,
  pub config: UpdaterConfig,
}

impl App {
  pub fn install(package_version: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    std::fs::create_dir_all(app.join("assets/fonts")).unwrap();
    std::fs::write(app.join(BUNDLE_FILENAME), EMBEDDED).unwrap();
    std::fs::write(app.join("assets/fonts/body.ttf"), b"font").unwrap();
    std::fs::write(app.join("assets/splash.png"), b"splash").unwrap();

    let config = UpdaterConfig::new(package_version, app.join(BUNDLE_FILENAME), app.join("assets"))
      .with_root(temp.path().join("store"));
    Self { temp, config }
  }

  /// Same installation after the package was upgraded in place.
  pub fn upgraded(&self, package_version: &str) -> UpdaterConfig {
    let mut config = self.config.clone();
    config.package_version = package_version.to_string();
    config
  }

  pub fn bundle(&self, hash: &str) -> PathBuf {
    self.config.root_dir.join(hash).join(BUNDLE_FILENAME)
  }

  pub fn store_entries(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&self.config.root_dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .filter(|name| !name.starts_with('.'))
      .collect();
    names.sort();
    names
  }
}
