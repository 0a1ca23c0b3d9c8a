use std::fs;

use hotpatch_lib::Updater;
use hotpatch_lib::consts::{BUNDLE_FILENAME, DIFF_MANIFEST_FILENAME, PATCH_FILENAME};
use hotpatch_lib::patch::diff;

use super::common::{App, EMBEDDED, MemoryTransport};

const V1: &[u8] = b"require('app').start({ build: 'v1', features: ['a', 'b', 'c', 'd'] });";
const V2: &[u8] = b"require('app').start({ build: 'v2', features: ['a', 'b', 'c', 'd', 'e'] });";

#[tokio::test]
async fn package_then_bundle_patch_chain() {
  let app = App::install("3.2.1");
  let transport = MemoryTransport::default();
  let from_package = diff(EMBEDDED, V1);
  transport.serve(
    "https://cdn/p1.zip",
    &[
      (PATCH_FILENAME, from_package.as_slice()),
      (
        DIFF_MANIFEST_FILENAME,
        br#"{"copies":{"splash.png":"splash.png","fonts":"fonts"},"deletes":{}}"#.as_slice(),
      ),
      ("new.png", b"new".as_slice()),
    ],
  );
  let from_bundle = diff(V1, V2);
  transport.serve(
    "https://cdn/p2.zip",
    &[
      (PATCH_FILENAME, from_bundle.as_slice()),
      (
        DIFF_MANIFEST_FILENAME,
        br#"{"copies":{"fonts/body.ttf":"fonts/body.ttf","hero.png":"new.png"},"deletes":["splash.png"]}"#.as_slice(),
      ),
    ],
  );

  let updater = Updater::with_transport(app.config.clone(), transport.clone());
  let h1 = updater.download_patch_from_package("https://cdn/p1.zip", "h1").await.unwrap();
  assert_eq!(fs::read(h1.join(BUNDLE_FILENAME)).unwrap(), V1);
  assert_eq!(fs::read(h1.join("fonts/body.ttf")).unwrap(), b"font");
  assert_eq!(fs::read(h1.join("splash.png")).unwrap(), b"splash");
  assert!(!h1.join(PATCH_FILENAME).exists());
  assert!(!h1.join(DIFF_MANIFEST_FILENAME).exists());

  let h2 = updater
    .download_patch_from_bundle("https://cdn/p2.zip", "h2", "h1")
    .await
    .unwrap();
  assert_eq!(fs::read(h2.join(BUNDLE_FILENAME)).unwrap(), V2);
  assert_eq!(fs::read(h2.join("fonts/body.ttf")).unwrap(), b"font");
  assert_eq!(fs::read(h2.join("hero.png")).unwrap(), b"new");
  assert!(!h2.join("splash.png").exists());
}

#[tokio::test]
async fn patch_against_wrong_baseline_is_rejected() {
  let app = App::install("3.2.1");
  let transport = MemoryTransport::default();
  let wrong = diff(b"some other bundle entirely", V1);
  transport.serve("https://cdn/p1.zip", &[(PATCH_FILENAME, wrong.as_slice())]);

  let updater = Updater::with_transport(app.config.clone(), transport);
  let err = updater
    .download_patch_from_package("https://cdn/p1.zip", "h1")
    .await
    .unwrap_err();

  assert_eq!(err.code(), "PATCH_ERROR");
  assert!(!app.bundle("h1").exists());
  assert!(updater.set_need_update("h1").is_err());
}

#[tokio::test]
async fn missing_copy_source_is_a_file_operation_error() {
  let app = App::install("3.2.1");
  let transport = MemoryTransport::default();
  let patch = diff(EMBEDDED, V1);
  transport.serve(
    "https://cdn/p1.zip",
    &[
      (PATCH_FILENAME, patch.as_slice()),
      (DIFF_MANIFEST_FILENAME, br#"{"copies":{"a.png":"does-not-exist.png"}}"#.as_slice()),
    ],
  );

  let updater = Updater::with_transport(app.config.clone(), transport);
  let err = updater
    .download_patch_from_package("https://cdn/p1.zip", "h1")
    .await
    .unwrap_err();

  assert_eq!(err.code(), "FILE_OPERATION_ERROR");
  assert!(err.to_string().contains("does-not-exist.png"));
}
