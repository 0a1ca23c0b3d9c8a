//! `hotpatch diff`: produce a patch file for `patch-package`/`patch-bundle`
//! archives.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use hotpatch_lib::patch;
use hotpatch_lib::util::hash::{hash_bytes, truncate_hash};

use crate::output::{OutputFormat, format_bytes, print_json, print_stat, print_success};

pub fn cmd_diff(baseline: &Path, target: &Path, patch_path: &Path, output: OutputFormat) -> Result<()> {
  let old = fs::read(baseline).with_context(|| format!("Failed to read {}", baseline.display()))?;
  let new = fs::read(target).with_context(|| format!("Failed to read {}", target.display()))?;

  let bytes = patch::diff(&old, &new);
  // The patch must reproduce the target before it is shipped.
  patch::format::apply_bytes(&bytes, &old).context("Generated patch does not reproduce the target")?;
  fs::write(patch_path, &bytes).with_context(|| format!("Failed to write {}", patch_path.display()))?;

  let baseline_hash = hash_bytes(&old);
  let target_hash = hash_bytes(&new);

  if output.is_json() {
    print_json(&serde_json::json!({
      "patch": patch_path,
      "size": bytes.len(),
      "baseline_sha256": baseline_hash,
      "target_sha256": target_hash,
    }))?;
  } else {
    print_success(&format!("Wrote {}", patch_path.display()));
    print_stat("Size", &format_bytes(bytes.len() as u64));
    print_stat("Baseline", truncate_hash(&baseline_hash));
    print_stat("Target", truncate_hash(&target_hash));
  }
  Ok(())
}
