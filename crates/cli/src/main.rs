mod app;
mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use app::AppArgs;
use output::OutputFormat;

/// hotpatch - on-device hot-update client
#[derive(Parser)]
#[command(name = "hotpatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(flatten)]
  app: AppArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the bundle to load on this start (may roll back)
  Resolve,

  /// Download a complete version
  Download {
    /// Archive URL (http, https or file)
    url: String,
    /// Version hash
    hash: String,
  },

  /// Download a diff against the bundle embedded in the package
  PatchPackage {
    /// Archive URL (http, https or file)
    url: String,
    /// Version hash
    hash: String,
  },

  /// Download a diff against a previously downloaded version
  PatchBundle {
    /// Archive URL (http, https or file)
    url: String,
    /// Version hash
    hash: String,
    /// Version the diff was computed against
    origin: String,
  },

  /// Load a downloaded version on the next start
  Activate {
    /// Version hash
    hash: String,
  },

  /// Activate a downloaded version and request an immediate reload
  Reload {
    /// Version hash
    hash: String,
  },

  /// Confirm the running version booted successfully
  MarkSuccess,

  /// Block updates for a while
  Block {
    /// How long, e.g. "2h" or "3days"
    duration: String,
    /// Reason reported back to the host
    #[arg(short, long, default_value = "")]
    reason: String,
  },

  /// Show or set the device identifier
  Uuid {
    /// New identifier
    id: Option<String>,
  },

  /// Show updater state (consumes one-shot boot markers)
  Info,

  /// Remove every version except the current one
  Gc {
    /// Only report what would be removed
    #[arg(long)]
    dry_run: bool,
  },

  /// Write a binary diff between two bundles
  Diff {
    /// Bundle the diff applies to
    baseline: PathBuf,
    /// Bundle the diff produces
    target: PathBuf,
    /// Output patch file
    patch: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let app = &cli.app;
  let output = cli.output;

  match cli.command {
    Commands::Resolve => cmd::cmd_resolve(app, output),
    Commands::Download { url, hash } => cmd::cmd_download(app, cmd::Download::Full { url, hash }, output),
    Commands::PatchPackage { url, hash } => cmd::cmd_download(app, cmd::Download::FromPackage { url, hash }, output),
    Commands::PatchBundle { url, hash, origin } => {
      cmd::cmd_download(app, cmd::Download::FromBundle { url, hash, origin }, output)
    }
    Commands::Activate { hash } => cmd::cmd_activate(app, &hash, output),
    Commands::Reload { hash } => cmd::cmd_reload(app, &hash, output),
    Commands::MarkSuccess => cmd::cmd_mark_success(app, output),
    Commands::Block { duration, reason } => cmd::cmd_block(app, &duration, &reason, output),
    Commands::Uuid { id } => cmd::cmd_uuid(app, id.as_deref(), output),
    Commands::Info => cmd::cmd_info(app, output),
    Commands::Gc { dry_run } => cmd::cmd_gc(app, dry_run, output),
    Commands::Diff { baseline, target, patch } => cmd::cmd_diff(&baseline, &target, &patch, output),
  }
}
