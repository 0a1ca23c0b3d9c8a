//! SHA-256 helpers used for diff signatures.

use sha2::{Digest, Sha256};

/// Raw SHA-256 digest of a byte slice.
pub fn digest_bytes(bytes: &[u8]) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  let mut out = [0u8; 32];
  out.copy_from_slice(&hasher.finalize());
  out
}

/// Lowercase hex SHA-256 of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
  hex::encode(digest_bytes(bytes))
}

/// Short form of a hash for log lines and CLI output.
pub fn truncate_hash(hash: &str) -> &str {
  hash.char_indices().nth(12).map_or(hash, |(i, _)| &hash[..i])
}
