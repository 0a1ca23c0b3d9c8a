//! Content-addressed bundle store.
//!
//! Layout:
//! ```text
//! <root>/
//! ├── .state/               # version record and flags
//! ├── .lock                 # store lock
//! ├── <hash>/               # one directory per version
//! │   └── index.bundlejs    # canonical bundle; presence makes the version loadable
//! ├── <hash>.ppk            # transient download, removed after extraction
//! └── <hash>.tmp/           # staging directory, renamed onto <hash>/ once complete
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::consts::{BUNDLE_FILENAME, LOCK_FILENAME, STAGING_SUFFIX, STATE_DIR};

#[derive(Debug, Clone)]
pub struct BundleStore {
  root: PathBuf,
}

impl BundleStore {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Create the store root if needed.
  pub fn ensure_root(&self) -> io::Result<()> {
    fs::create_dir_all(&self.root)
  }

  /// Directory holding version `hash`.
  pub fn version_dir(&self, hash: &str) -> PathBuf {
    self.root.join(hash)
  }

  /// Canonical bundle path for version `hash`.
  pub fn bundle_path(&self, hash: &str) -> PathBuf {
    self.version_dir(hash).join(BUNDLE_FILENAME)
  }

  /// Path a download for `hash` is written to before extraction.
  pub fn download_path(&self, hash: &str, suffix: &str) -> PathBuf {
    self.root.join(format!("{}{}", hash, suffix))
  }

  /// Directory a version is assembled in before it replaces `<hash>/`.
  pub fn staging_dir(&self, hash: &str) -> PathBuf {
    self.root.join(format!("{}{}", hash, STAGING_SUFFIX))
  }

  /// A version is loadable iff its directory holds the canonical bundle file.
  pub fn is_loadable(&self, hash: &str) -> bool {
    if !is_valid_hash(hash) {
      return false;
    }
    let loadable = self.bundle_path(hash).is_file();
    debug!(hash, loadable, "checked bundle directory");
    loadable
  }

  /// Whether a top-level entry name belongs to store bookkeeping rather than
  /// to a version.
  pub fn is_metadata_entry(name: &str) -> bool {
    name == STATE_DIR || name == LOCK_FILENAME
  }
}

/// A hash names a directory directly under the store root, so it must be a
/// single normal path component.
pub fn is_valid_hash(hash: &str) -> bool {
  if hash.is_empty() || BundleStore::is_metadata_entry(hash) {
    return false;
  }
  let mut components = Path::new(hash).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(c)), None) if c == hash
  )
}
