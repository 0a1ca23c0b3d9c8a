//! `hotpatch resolve`: decide which bundle this start loads.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use hotpatch_lib::Updater;

use crate::app::AppArgs;
use crate::output::{OutputFormat, print_json};

/// Print the bundle path to load. Unconfirmed versions are rolled back here,
/// so the store is locked for the duration. Boot must always get a bundle:
/// without a usable config or with the store busy this prints the embedded one.
pub fn cmd_resolve(app: &AppArgs, output: OutputFormat) -> Result<()> {
  let bundle = resolve(app);

  if output.is_json() {
    print_json(&serde_json::json!({ "bundle": bundle }))?;
  } else {
    println!("{}", bundle.display());
  }
  Ok(())
}

fn resolve(app: &AppArgs) -> PathBuf {
  let config = match app.config() {
    Ok(config) => config,
    Err(e) => {
      let reason = format!("{:#}", e);
      warn!(error = %reason, "updater not configured, loading embedded bundle");
      return app.embedded_bundle.clone();
    }
  };

  let _lock = match app.lock("resolve") {
    Ok(lock) => lock,
    Err(e) => {
      let reason = format!("{:#}", e);
      warn!(error = %reason, "store unavailable, loading embedded bundle");
      return config.embedded_bundle;
    }
  };

  Updater::new(config).resolve_bundle_to_load()
}
