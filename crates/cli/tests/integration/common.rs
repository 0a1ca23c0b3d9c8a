//! Shared test helpers for CLI integration tests.

use std::io::Write;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const EMBEDDED: &[u8] = b"require('app').start({ build: 'embedded', screens: ['home', 'settings'] });";

/// Isolated installation: embedded bundle, assets and a private store.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };
    env.write_file("app/index.bundlejs", EMBEDDED);
    env.write_file("app/assets/logo.png", b"logo");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &[u8]) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write a zip archive and return its `file://` URL.
  pub fn archive(&self, name: &str, entries: &[(&str, &[u8])]) -> String {
    let path = self.temp.path().join("cdn").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (entry, data) in entries {
      writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
      writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    format!("file://{}", path.display())
  }

  /// Store root (isolated per test).
  pub fn root_path(&self) -> PathBuf {
    let p = self.temp.path().join("store");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn app_path(&self) -> PathBuf {
    let p = self.temp.path().join("app");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn bundle(&self, hash: &str) -> PathBuf {
    self.root_path().join(hash).join("index.bundlejs")
  }

  /// Pre-configured command for the hotpatch binary at package `version`.
  pub fn hp_cmd_at(&self, version: &str) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("hotpatch");
    cmd.env("HOTPATCH_ROOT", self.root_path());
    cmd.env("HOTPATCH_PACKAGE_VERSION", version);
    cmd.env("HOTPATCH_EMBEDDED_BUNDLE", self.app_path().join("index.bundlejs"));
    cmd.env("HOTPATCH_EMBEDDED_ASSETS", self.app_path().join("assets"));
    cmd.env("HOTPATCH_BUILD_TIME", "1700000000");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  pub fn hp_cmd(&self) -> Command {
    self.hp_cmd_at("1.0.0")
  }

  /// Run `args` with `-o json` and parse stdout.
  pub fn json(&self, args: &[&str]) -> serde_json::Value {
    let out = self.hp_cmd().args(["-o", "json"]).args(args).output().unwrap();
    assert!(out.status.success(), "{:?} failed: {}", args, String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
  }

  pub fn resolve(&self) -> PathBuf {
    let out = self.json(&["resolve"]);
    PathBuf::from(out["bundle"].as_str().unwrap())
  }
}
