use std::time::Instant;

use anyhow::Result;

use hotpatch_lib::gc::collect_garbage;
use hotpatch_lib::state::VersionStore;
use hotpatch_lib::store::BundleStore;

use crate::app::AppArgs;
use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(app: &AppArgs, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let root = app.root_dir();

  let _lock = app.lock("gc")?;

  // Any package version will do: only the current hash is needed.
  let keep = VersionStore::under_root(&root, app.package_version.clone().unwrap_or_default())
    .read()
    .map(|record| record.current_version)
    .filter(|hash| !hash.is_empty());

  let result = collect_garbage(&BundleStore::new(root), keep.as_deref(), dry_run);

  if output.is_json() {
    print_json(&result)?;
  } else {
    println!();
    if dry_run {
      print_info("Dry run - no changes made");
    } else {
      print_success("Garbage collection complete!");
    }
    print_stat("Kept", keep.as_deref().unwrap_or("nothing"));
    print_stat("Entries removed", &result.stats.entries_deleted.to_string());
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
