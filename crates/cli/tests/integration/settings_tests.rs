use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn uuid_round_trips() {
  let env = TestEnv::new();

  env
    .hp_cmd()
    .args(["uuid"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No device id set"));
  env.hp_cmd().args(["uuid", "device-42"]).assert().success();

  env
    .hp_cmd()
    .arg("uuid")
    .assert()
    .success()
    .stdout(predicate::str::diff("device-42\n"));
  assert_eq!(env.json(&["info"])["uuid"], "device-42");
}

#[test]
fn block_is_reported_by_info() {
  let env = TestEnv::new();

  let block = env.json(&["block", "2h", "--reason", "maintenance"]);
  let until = block["until"].as_i64().unwrap();

  let info = env.json(&["info"]);
  assert_eq!(info["block_update"]["until"].as_i64(), Some(until));
  assert_eq!(info["block_update"]["reason"], "maintenance");
}
