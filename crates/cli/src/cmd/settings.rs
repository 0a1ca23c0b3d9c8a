//! `hotpatch block` and `hotpatch uuid`.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use hotpatch_lib::Updater;
use hotpatch_lib::state::BlockUpdate;

use crate::app::AppArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

pub fn cmd_block(app: &AppArgs, duration: &str, reason: &str, output: OutputFormat) -> Result<()> {
  let duration = humantime::parse_duration(duration).with_context(|| format!("Invalid duration: {}", duration))?;
  let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
  let until = i64::try_from((now + duration).as_secs()).context("Duration too large")?;

  let config = app.config()?;
  let _lock = app.lock("block")?;
  Updater::new(config)
    .set_block_update(until, reason)
    .context("Failed to store update block")?;

  if output.is_json() {
    print_json(&BlockUpdate {
      until,
      reason: reason.to_string(),
    })?;
  } else {
    print_success(&format!("Updates blocked for {}", humantime::format_duration(duration)));
    print_stat("Until", &humantime::format_rfc3339_seconds(UNIX_EPOCH + now + duration).to_string());
  }
  Ok(())
}

pub fn cmd_uuid(app: &AppArgs, id: Option<&str>, output: OutputFormat) -> Result<()> {
  let config = app.config()?;

  let uuid = match id {
    Some(id) => {
      let _lock = app.lock("uuid")?;
      Updater::new(config).set_uuid(id).context("Failed to store uuid")?;
      Some(id.to_string())
    }
    None => hotpatch_lib::state::VersionStore::under_root(&config.root_dir, config.package_version).uuid(),
  };

  if output.is_json() {
    print_json(&serde_json::json!({ "uuid": uuid }))?;
    return Ok(());
  }
  match (id, uuid) {
    (Some(id), _) => print_success(&format!("Device id set to {}", id)),
    (None, Some(uuid)) => println!("{}", uuid),
    (None, None) => print_info("No device id set"),
  }
  Ok(())
}
