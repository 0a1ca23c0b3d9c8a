//! `hotpatch activate`, `reload` and `mark-success`.

use std::path::Path;

use anyhow::{Context, Result};

use hotpatch_lib::{ReloadHost, Updater};

use crate::app::AppArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

/// Reload requests go to stdout for whatever supervises the bundle runtime.
struct StdoutReload {
  json: bool,
}

impl ReloadHost for StdoutReload {
  fn request_reload(&self, bundle: &Path) {
    if self.json {
      println!("{}", serde_json::json!({ "reload": bundle }));
    } else {
      println!("reload {}", bundle.display());
    }
  }
}

pub fn cmd_activate(app: &AppArgs, hash: &str, output: OutputFormat) -> Result<()> {
  let config = app.config()?;
  let _lock = app.lock("activate")?;

  let record = Updater::new(config)
    .set_need_update(hash)
    .with_context(|| format!("Failed to activate {}", hash))?;

  if output.is_json() {
    print_json(&record)?;
  } else {
    print_success(&format!("Version {} loads on next start", record.current_version));
    if !record.last_version.is_empty() {
      print_stat("Previous", &record.last_version);
    }
  }
  Ok(())
}

pub fn cmd_reload(app: &AppArgs, hash: &str, output: OutputFormat) -> Result<()> {
  let config = app.config()?;
  let _lock = app.lock("reload")?;

  Updater::new(config)
    .with_reload_host(StdoutReload {
      json: output.is_json(),
    })
    .reload_update(hash)
    .with_context(|| format!("Failed to reload into {}", hash))?;
  Ok(())
}

pub fn cmd_mark_success(app: &AppArgs, output: OutputFormat) -> Result<()> {
  let config = app.config()?;
  let _lock = app.lock("mark-success")?;

  let record = Updater::new(config)
    .mark_success()
    .context("Failed to confirm current version")?;

  if output.is_json() {
    print_json(&record)?;
    return Ok(());
  }
  match record {
    Some(record) => print_success(&format!("Version {} confirmed", record.current_version)),
    None => print_info("No downloaded version is active"),
  }
  Ok(())
}
