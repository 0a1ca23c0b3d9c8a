//! `hotpatch info`: updater state as the host sees it at startup.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use hotpatch_lib::Updater;
use hotpatch_lib::util::hash::truncate_hash;

use crate::app::AppArgs;
use crate::output::{OutputFormat, print_json, print_stat, print_warning};

pub fn cmd_info(app: &AppArgs, output: OutputFormat) -> Result<()> {
  let config = app.config()?;
  let _lock = app.lock("info")?;

  let constants = Updater::new(config).constants();

  if output.is_json() {
    return print_json(&constants);
  }

  println!("{}", "Updater:".if_supports_color(Stream::Stdout, |s| s.bold()));
  print_stat("Store", &constants.download_root_dir.display().to_string());
  print_stat("Package version", &constants.package_version);
  if !constants.build_time.is_empty() {
    print_stat("Build time", &constants.build_time);
  }
  print_stat(
    "Current version",
    constants.current_version.as_deref().map(truncate_hash).unwrap_or("embedded"),
  );
  if let Some(uuid) = &constants.uuid {
    print_stat("Device id", uuid);
  }
  if let Some(block) = &constants.block_update {
    print_stat("Updates blocked until", &block.until.to_string());
    if !block.reason.is_empty() {
      print_stat("Block reason", &block.reason);
    }
  }
  if constants.is_first_time {
    print_stat("First start", "yes");
  }
  if constants.is_rolled_back {
    print_warning("The last activated version failed to start and was rolled back");
  }
  Ok(())
}
