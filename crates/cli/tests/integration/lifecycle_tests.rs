use hotpatch_lib::store_lock::{LockMode, StoreLock};
use predicates::prelude::*;

use super::common::{EMBEDDED, TestEnv};

const V1: &[u8] = b"require('app').start({ build: 'v1', screens: ['home', 'settings', 'about'] });";
const V2: &[u8] = b"require('app').start({ build: 'v2', screens: ['home', 'settings', 'about', 'faq'] });";

fn install(env: &TestEnv, hash: &str, body: &[u8]) {
  let url = env.archive(&format!("{hash}.zip"), &[("index.bundlejs", body)]);
  env
    .hp_cmd()
    .args(["download", &url, hash])
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Version {} ready", hash)));
}

#[test]
fn download_activate_and_confirm() {
  let env = TestEnv::new();
  install(&env, "h1", V1);

  env
    .hp_cmd()
    .args(["activate", "h1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("h1 loads on next start"));

  assert_eq!(env.resolve(), env.bundle("h1"));
  let info = env.json(&["info"]);
  assert_eq!(info["current_version"], "h1");
  assert_eq!(info["is_first_time"], true);
  assert_eq!(info["build_time"], "1700000000");

  env
    .hp_cmd()
    .arg("mark-success")
    .assert()
    .success()
    .stdout(predicate::str::contains("h1 confirmed"));
  assert_eq!(env.resolve(), env.bundle("h1"));
}

#[test]
fn unconfirmed_version_rolls_back() {
  let env = TestEnv::new();
  install(&env, "h1", V1);
  env.hp_cmd().args(["activate", "h1"]).assert().success();
  env.resolve();
  env.hp_cmd().arg("mark-success").assert().success();

  install(&env, "h2", V2);
  let record = env.json(&["activate", "h2"]);
  assert_eq!(record["current_version"], "h2");
  assert_eq!(record["last_version"], "h1");

  // each invocation is a fresh process
  assert_eq!(env.resolve(), env.bundle("h2"));
  assert_eq!(env.resolve(), env.bundle("h1"));

  let info = env.json(&["info"]);
  assert_eq!(info["is_rolled_back"], true);
  assert_eq!(info["current_version"], "h1");
  assert!(!env.root_path().join("h2").exists());
}

#[test]
fn resolve_with_busy_store_loads_embedded_bundle() {
  let env = TestEnv::new();
  install(&env, "h1", V1);
  env.hp_cmd().args(["activate", "h1"]).assert().success();

  let lock = StoreLock::acquire(&env.root_path(), LockMode::Exclusive, "download").unwrap();
  let out = env.json(&["resolve"]);
  assert_eq!(out["bundle"], env.app_path().join("index.bundlejs").display().to_string());
  drop(lock);

  // the pending version was left untouched and still gets its first start
  assert_eq!(env.resolve(), env.bundle("h1"));
}

#[test]
fn resolve_without_package_version_loads_embedded_bundle() {
  let env = TestEnv::new();
  env
    .hp_cmd()
    .env_remove("HOTPATCH_PACKAGE_VERSION")
    .arg("resolve")
    .assert()
    .success()
    .stdout(predicate::str::contains("index.bundlejs"))
    .stderr(predicate::str::contains("package version is required"));
}

#[test]
fn patch_from_package_then_bundle() {
  let env = TestEnv::new();
  let embedded = env.app_path().join("index.bundlejs");
  let v1 = env.write_file("build/v1.js", V1);
  let v2 = env.write_file("build/v2.js", V2);
  let p1 = env.temp.path().join("build/p1.patch");
  let p2 = env.temp.path().join("build/p2.patch");

  for (from, to, out) in [(&embedded, &v1, &p1), (&v1, &v2, &p2)] {
    env
      .hp_cmd()
      .arg("diff")
      .args([from, to, out])
      .assert()
      .success();
  }

  let url = env.archive(
    "p1.zip",
    &[
      ("index.bundlejs.patch", std::fs::read(&p1).unwrap().as_slice()),
      ("__diff.json", br#"{"copies":{"logo.png":"logo.png"}}"#.as_slice()),
    ],
  );
  env.hp_cmd().args(["patch-package", &url, "h1"]).assert().success();
  assert_eq!(std::fs::read(env.bundle("h1")).unwrap(), V1);
  assert_eq!(std::fs::read(env.root_path().join("h1/logo.png")).unwrap(), b"logo");

  let url = env.archive(
    "p2.zip",
    &[
      ("index.bundlejs.patch", std::fs::read(&p2).unwrap().as_slice()),
      ("__diff.json", br#"{"copies":{"img/logo.png":"logo.png"},"deletes":[]}"#.as_slice()),
    ],
  );
  env.hp_cmd().args(["patch-bundle", &url, "h2", "h1"]).assert().success();
  assert_eq!(std::fs::read(env.bundle("h2")).unwrap(), V2);
  assert_eq!(std::fs::read(env.root_path().join("h2/img/logo.png")).unwrap(), b"logo");
}

#[test]
fn patch_against_wrong_baseline_fails() {
  let env = TestEnv::new();
  let other = env.write_file("build/other.js", b"not the embedded bundle");
  let v1 = env.write_file("build/v1.js", V1);
  let patch = env.temp.path().join("build/p.patch");
  env.hp_cmd().arg("diff").args([&other, &v1, &patch]).assert().success();

  let url = env.archive("p.zip", &[("index.bundlejs.patch", std::fs::read(&patch).unwrap().as_slice())]);
  env
    .hp_cmd()
    .args(["patch-package", &url, "h1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("PATCH_ERROR"));

  assert!(!env.bundle("h1").exists());
  assert_eq!(std::fs::read(env.resolve()).unwrap(), EMBEDDED);
}

#[test]
fn package_upgrade_falls_back_to_embedded() {
  let env = TestEnv::new();
  install(&env, "h1", V1);
  env.hp_cmd().args(["activate", "h1"]).assert().success();

  let out = env.hp_cmd_at("2.0.0").args(["-o", "json", "resolve"]).output().unwrap();
  let resolved: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
  assert_eq!(
    resolved["bundle"].as_str().unwrap(),
    env.app_path().join("index.bundlejs").to_str().unwrap()
  );

  env.hp_cmd_at("2.0.0").arg("info").assert().success();
  assert!(!env.root_path().join("h1").exists());
}

#[test]
fn reload_prints_bundle_path() {
  let env = TestEnv::new();
  install(&env, "h1", V1);

  env
    .hp_cmd()
    .args(["reload", "h1"])
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("reload {}", env.bundle("h1").display())));
}
