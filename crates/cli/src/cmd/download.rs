//! `hotpatch download`, `patch-package` and `patch-bundle`.

use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use hotpatch_lib::Updater;
use hotpatch_lib::update::UpdateError;

use crate::app::AppArgs;
use crate::output::{OutputFormat, format_duration, print_json, print_progress, print_stat, print_success};

pub enum Download {
  Full { url: String, hash: String },
  FromPackage { url: String, hash: String },
  FromBundle { url: String, hash: String, origin: String },
}

impl Download {
  fn hash(&self) -> &str {
    match self {
      Download::Full { hash, .. } | Download::FromPackage { hash, .. } | Download::FromBundle { hash, .. } => hash,
    }
  }

  fn command(&self) -> &'static str {
    match self {
      Download::Full { .. } => "download",
      Download::FromPackage { .. } => "patch-package",
      Download::FromBundle { .. } => "patch-bundle",
    }
  }
}

#[derive(Serialize)]
struct DownloadOutput<'a> {
  hash: &'a str,
  path: std::path::PathBuf,
}

/// Run one update request and report where the new version landed.
///
/// Failures are reported as `<CODE>: <message>` with the code the host
/// bridge would see.
pub fn cmd_download(app: &AppArgs, download: Download, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let config = app.config()?;
  let _lock = app.lock(download.command())?;
  let updater = Updater::new(config);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let path = rt
    .block_on(async {
      let progress = (!output.is_json()).then(|| {
        let mut rx = updater.subscribe();
        tokio::spawn(async move {
          loop {
            match rx.recv().await {
              Ok(event) => print_progress(&event.hash, event.received, event.total),
              Err(RecvError::Lagged(_)) => continue,
              Err(RecvError::Closed) => break,
            }
          }
        })
      });

      let result = match &download {
        Download::Full { url, hash } => updater.download_update(url, hash).await,
        Download::FromPackage { url, hash } => updater.download_patch_from_package(url, hash).await,
        Download::FromBundle { url, hash, origin } => updater.download_patch_from_bundle(url, hash, origin).await,
      };

      if let Some(task) = progress {
        task.abort();
        eprintln!();
      }
      result
    })
    .map_err(host_error)?;

  if output.is_json() {
    print_json(&DownloadOutput {
      hash: download.hash(),
      path,
    })?;
  } else {
    print_success(&format!("Version {} ready", download.hash()));
    print_stat("Path", &path.display().to_string());
    print_stat("Duration", &format_duration(start.elapsed()));
  }
  Ok(())
}

fn host_error(e: UpdateError) -> anyhow::Error {
  anyhow!("{}: {}", e.code(), e)
}
