//! Binary diff codec.
//!
//! A diff is a header binding it to exactly one baseline and one target,
//! followed by a control stream replayed against the baseline bytes.
//!
//! ```text
//! magic            8 bytes   "HPDIFF01"
//! baseline_len     u64 LE
//! baseline_sha256  32 bytes
//! target_len       u64 LE
//! target_sha256    32 bytes
//! ops:
//!   0x01 COPY   len: u64      append baseline[cursor..cursor+len], advance cursor
//!   0x02 INSERT len: u64 data append literal bytes
//!   0x03 SEEK   delta: i64    move the baseline cursor
//!   0x00 END
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::util::hash::digest_bytes;

pub const MAGIC: &[u8; 8] = b"HPDIFF01";

const OP_END: u8 = 0x00;
const OP_COPY: u8 = 0x01;
const OP_INSERT: u8 = 0x02;
const OP_SEEK: u8 = 0x03;

const HEADER_LEN: usize = 8 + 8 + 32 + 8 + 32;

/// Shortest baseline run the generator turns into a COPY.
const MATCH_BLOCK: usize = 16;

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("not a diff: bad magic")]
  BadMagic,

  #[error("diff truncated at byte {offset}")]
  Truncated { offset: usize },

  #[error("unknown diff instruction {tag:#04x} at byte {offset}")]
  UnknownOp { tag: u8, offset: usize },

  #[error("baseline length mismatch: diff expects {expected} bytes, got {actual}")]
  BaselineLength { expected: u64, actual: u64 },

  #[error("baseline signature mismatch")]
  BaselineSignature,

  #[error("instruction at byte {offset} leaves the baseline bounds")]
  OutOfBounds { offset: usize },

  #[error("instruction at byte {offset} overflows the recorded target length")]
  TargetOverflow { offset: usize },

  #[error("unexpected data after end of diff at byte {offset}")]
  TrailingData { offset: usize },

  #[error("reconstructed output does not match the recorded target")]
  TargetMismatch,
}

struct Cursor<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Cursor<'a> {
  fn take(&mut self, n: usize) -> Result<&'a [u8], PatchError> {
    let end = self
      .pos
      .checked_add(n)
      .filter(|end| *end <= self.buf.len())
      .ok_or(PatchError::Truncated { offset: self.pos })?;
    let bytes = &self.buf[self.pos..end];
    self.pos = end;
    Ok(bytes)
  }

  fn u8(&mut self) -> Result<u8, PatchError> {
    Ok(self.take(1)?[0])
  }

  fn u64(&mut self) -> Result<u64, PatchError> {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(self.take(8)?);
    Ok(u64::from_le_bytes(raw))
  }

  fn i64(&mut self) -> Result<i64, PatchError> {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(self.take(8)?);
    Ok(i64::from_le_bytes(raw))
  }

  fn digest(&mut self) -> Result<[u8; 32], PatchError> {
    let mut raw = [0u8; 32];
    raw.copy_from_slice(self.take(32)?);
    Ok(raw)
  }
}

/// Rebuild the target bytes from `patch` and `baseline`.
pub fn apply_bytes(patch: &[u8], baseline: &[u8]) -> Result<Vec<u8>, PatchError> {
  let mut cur = Cursor { buf: patch, pos: 0 };

  if cur.take(MAGIC.len()).map_err(|_| PatchError::BadMagic)? != MAGIC {
    return Err(PatchError::BadMagic);
  }

  let baseline_len = cur.u64()?;
  let baseline_digest = cur.digest()?;
  let target_len = cur.u64()?;
  let target_digest = cur.digest()?;

  if baseline_len != baseline.len() as u64 {
    return Err(PatchError::BaselineLength {
      expected: baseline_len,
      actual: baseline.len() as u64,
    });
  }
  if digest_bytes(baseline) != baseline_digest {
    return Err(PatchError::BaselineSignature);
  }

  let target_len = usize::try_from(target_len).map_err(|_| PatchError::TargetOverflow { offset: HEADER_LEN })?;
  let mut out: Vec<u8> = Vec::with_capacity(target_len.min(64 * 1024 * 1024));
  let mut base_pos: usize = 0;

  loop {
    let offset = cur.pos;
    match cur.u8()? {
      OP_END => break,
      OP_COPY => {
        let len = usize::try_from(cur.u64()?).map_err(|_| PatchError::OutOfBounds { offset })?;
        let end = base_pos
          .checked_add(len)
          .filter(|end| *end <= baseline.len())
          .ok_or(PatchError::OutOfBounds { offset })?;
        if out.len() + len > target_len {
          return Err(PatchError::TargetOverflow { offset });
        }
        out.extend_from_slice(&baseline[base_pos..end]);
        base_pos = end;
      }
      OP_INSERT => {
        let len = usize::try_from(cur.u64()?).map_err(|_| PatchError::Truncated { offset })?;
        if out.len().saturating_add(len) > target_len {
          return Err(PatchError::TargetOverflow { offset });
        }
        out.extend_from_slice(cur.take(len)?);
      }
      OP_SEEK => {
        let delta = cur.i64()?;
        let next = (base_pos as i128) + (delta as i128);
        if next < 0 || next > baseline.len() as i128 {
          return Err(PatchError::OutOfBounds { offset });
        }
        base_pos = next as usize;
      }
      tag => return Err(PatchError::UnknownOp { tag, offset }),
    }
  }

  if cur.pos != patch.len() {
    return Err(PatchError::TrailingData { offset: cur.pos });
  }
  if out.len() != target_len || digest_bytes(&out) != target_digest {
    return Err(PatchError::TargetMismatch);
  }

  Ok(out)
}

/// Apply the diff at `patch_file` to `baseline_file`, writing `destination_file`.
///
/// The destination is written only once the output has been fully rebuilt
/// and verified, so any failure leaves no destination file behind.
pub fn apply(patch_file: &Path, baseline_file: &Path, destination_file: &Path) -> Result<(), PatchError> {
  let patch = fs::read(patch_file).map_err(|source| PatchError::Read {
    path: patch_file.to_path_buf(),
    source,
  })?;
  let baseline = fs::read(baseline_file).map_err(|source| PatchError::Read {
    path: baseline_file.to_path_buf(),
    source,
  })?;

  let output = apply_bytes(&patch, &baseline)?;

  let write_err = |source| PatchError::Write {
    path: destination_file.to_path_buf(),
    source,
  };
  if let Some(parent) = destination_file.parent() {
    fs::create_dir_all(parent).map_err(write_err)?;
  }
  let mut temp_name = destination_file.file_name().unwrap_or_default().to_os_string();
  temp_name.push(".tmp");
  let temp_path = destination_file.with_file_name(temp_name);
  fs::write(&temp_path, &output).map_err(write_err)?;
  fs::rename(&temp_path, destination_file).map_err(write_err)?;

  info!(
    destination = %destination_file.display(),
    baseline_size = baseline.len(),
    size = output.len(),
    "diff applied"
  );
  Ok(())
}

struct Encoder {
  buf: Vec<u8>,
}

impl Encoder {
  fn copy(&mut self, len: usize) {
    self.buf.push(OP_COPY);
    self.buf.extend_from_slice(&(len as u64).to_le_bytes());
  }

  fn insert(&mut self, data: &[u8]) {
    if data.is_empty() {
      return;
    }
    self.buf.push(OP_INSERT);
    self.buf.extend_from_slice(&(data.len() as u64).to_le_bytes());
    self.buf.extend_from_slice(data);
  }

  fn seek(&mut self, delta: i64) {
    if delta == 0 {
      return;
    }
    self.buf.push(OP_SEEK);
    self.buf.extend_from_slice(&delta.to_le_bytes());
  }
}

/// Produce a diff turning `baseline` into `target`.
///
/// Baseline blocks are indexed at fixed offsets; every target offset is
/// probed against the index and hits are extended in both directions.
pub fn diff(baseline: &[u8], target: &[u8]) -> Vec<u8> {
  let mut enc = Encoder {
    buf: Vec::with_capacity(HEADER_LEN + target.len() / 4),
  };
  enc.buf.extend_from_slice(MAGIC);
  enc.buf.extend_from_slice(&(baseline.len() as u64).to_le_bytes());
  enc.buf.extend_from_slice(&digest_bytes(baseline));
  enc.buf.extend_from_slice(&(target.len() as u64).to_le_bytes());
  enc.buf.extend_from_slice(&digest_bytes(target));

  let mut index: HashMap<&[u8], usize> = HashMap::new();
  for (i, block) in baseline.chunks_exact(MATCH_BLOCK).enumerate() {
    index.entry(block).or_insert(i * MATCH_BLOCK);
  }

  let mut base_pos = 0usize;
  let mut literal_start = 0usize;
  let mut i = 0usize;
  let mut copied = 0usize;

  while i + MATCH_BLOCK <= target.len() {
    let Some(&hit) = index.get(&target[i..i + MATCH_BLOCK]) else {
      i += 1;
      continue;
    };

    let (mut b_start, mut t_start) = (hit, i);
    while b_start > 0 && t_start > literal_start && baseline[b_start - 1] == target[t_start - 1] {
      b_start -= 1;
      t_start -= 1;
    }
    let (mut b_end, mut t_end) = (hit + MATCH_BLOCK, i + MATCH_BLOCK);
    while b_end < baseline.len() && t_end < target.len() && baseline[b_end] == target[t_end] {
      b_end += 1;
      t_end += 1;
    }

    enc.insert(&target[literal_start..t_start]);
    enc.seek(b_start as i64 - base_pos as i64);
    enc.copy(b_end - b_start);
    copied += b_end - b_start;

    base_pos = b_end;
    literal_start = t_end;
    i = t_end;
  }

  enc.insert(&target[literal_start..]);
  enc.buf.push(OP_END);

  debug!(
    baseline_size = baseline.len(),
    target_size = target.len(),
    copied,
    diff_size = enc.buf.len(),
    "diff generated"
  );
  enc.buf
}
