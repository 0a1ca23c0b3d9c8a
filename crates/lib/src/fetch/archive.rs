//! Zip extraction for downloaded update archives.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("failed to open archive {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid archive {path}: {message}")]
  Invalid { path: PathBuf, message: String },

  #[error("archive entry {name} escapes the destination")]
  UnsafeEntry { name: String },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Unpack the zip at `archive_path` into `dest`, keeping the archive's
/// directory structure. Returns the number of files written.
pub fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<usize, ExtractError> {
  let file = File::open(archive_path).map_err(|source| ExtractError::Open {
    path: archive_path.to_path_buf(),
    source,
  })?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ExtractError::Invalid {
    path: archive_path.to_path_buf(),
    message: e.to_string(),
  })?;

  let write_err = |path: &Path, source: io::Error| ExtractError::Write {
    path: path.to_path_buf(),
    source,
  };

  fs::create_dir_all(dest).map_err(|e| write_err(dest, e))?;

  let mut written = 0;
  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(|e| ExtractError::Invalid {
      path: archive_path.to_path_buf(),
      message: e.to_string(),
    })?;

    let rel = entry.enclosed_name().ok_or_else(|| ExtractError::UnsafeEntry {
      name: entry.name().to_string(),
    })?;
    let out_path = dest.join(rel);

    if entry.is_dir() {
      fs::create_dir_all(&out_path).map_err(|e| write_err(&out_path, e))?;
      continue;
    }

    if let Some(parent) = out_path.parent() {
      fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    let mut outfile = File::create(&out_path).map_err(|e| write_err(&out_path, e))?;
    io::copy(&mut entry, &mut outfile).map_err(|e| write_err(&out_path, e))?;
    debug!(path = %out_path.display(), "extracted");
    written += 1;
  }

  info!(archive = %archive_path.display(), dest = %dest.display(), files = written, "archive extracted");
  Ok(written)
}
