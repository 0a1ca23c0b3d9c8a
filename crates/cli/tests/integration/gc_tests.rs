use predicates::prelude::*;

use super::common::TestEnv;

fn seed(env: &TestEnv, hashes: &[&str]) {
  for hash in hashes {
    env.write_file(&format!("store/{hash}/index.bundlejs"), hash.as_bytes());
  }
}

#[test]
fn gc_with_empty_store_succeeds() {
  let env = TestEnv::new();

  env
    .hp_cmd()
    .arg("gc")
    .assert()
    .success()
    .stdout(predicate::str::contains("Garbage collection complete"));
}

#[test]
fn gc_dry_run_keeps_everything() {
  let env = TestEnv::new();
  seed(&env, &["a", "b"]);

  env
    .hp_cmd()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));

  assert!(env.root_path().join("a").exists());
  assert!(env.root_path().join("b").exists());
}

#[test]
fn gc_keeps_only_current_version() {
  let env = TestEnv::new();
  seed(&env, &["a", "b", "c"]);
  env.hp_cmd().args(["activate", "b"]).assert().success();

  let result = env.json(&["gc"]);

  assert_eq!(result["stats"]["entries_deleted"], 2);
  assert_eq!(result["kept"], "b");
  assert!(env.root_path().join("b").exists());
  assert!(!env.root_path().join("a").exists());
  assert!(!env.root_path().join("c").exists());
  assert!(env.root_path().join(".state").exists());
}
