use hotpatch_lib::Updater;
use hotpatch_lib::consts::BUNDLE_FILENAME;
use hotpatch_lib::state::{VersionRecord, VersionStore};

use super::common::{App, MemoryTransport};

const V1: &[u8] = b"require('app').start({ build: 'v1' });";
const V2: &[u8] = b"require('app').start({ build: 'v2' });";

fn boot(app: &App, transport: &MemoryTransport) -> Updater<MemoryTransport> {
  Updater::with_transport(app.config.clone(), transport.clone())
}

fn record(app: &App) -> Option<VersionRecord> {
  VersionStore::under_root(&app.config.root_dir, app.config.package_version.clone()).read()
}

#[tokio::test]
async fn crash_before_confirmation_rolls_back() {
  let app = App::install("1.0.0");
  let transport = MemoryTransport::default();
  transport.serve("https://cdn/v1.zip", &[(BUNDLE_FILENAME, V1)]);
  transport.serve("https://cdn/v2.zip", &[(BUNDLE_FILENAME, V2)]);

  let updater = boot(&app, &transport);
  updater.download_update("https://cdn/v1.zip", "h1").await.unwrap();
  updater.set_need_update("h1").unwrap();

  let updater = boot(&app, &transport);
  assert_eq!(updater.resolve_bundle_to_load(), app.bundle("h1"));
  updater.mark_success().unwrap();
  updater.download_update("https://cdn/v2.zip", "h2").await.unwrap();
  updater.set_need_update("h2").unwrap();

  assert_eq!(
    record(&app).unwrap(),
    VersionRecord {
      current_version: "h2".into(),
      last_version: "h1".into(),
      package_version: "1.0.0".into(),
      is_first_time: true,
      is_first_load_ok: false,
    }
  );

  // first boot of h2, then the process dies without confirming
  let updater = boot(&app, &transport);
  assert_eq!(updater.resolve_bundle_to_load(), app.bundle("h2"));
  assert!(updater.constants().is_first_time);

  let updater = boot(&app, &transport);
  assert_eq!(updater.resolve_bundle_to_load(), app.bundle("h1"));
  assert_eq!(
    record(&app).unwrap(),
    VersionRecord {
      current_version: "h1".into(),
      last_version: String::new(),
      package_version: "1.0.0".into(),
      is_first_time: false,
      is_first_load_ok: true,
    }
  );
  assert!(updater.constants().is_rolled_back);
  assert_eq!(app.store_entries(), vec!["h1".to_string()]);
}

#[tokio::test]
async fn confirmed_version_survives_restarts() {
  let app = App::install("1.0.0");
  let transport = MemoryTransport::default();
  transport.serve("https://cdn/v1.zip", &[(BUNDLE_FILENAME, V1)]);

  let updater = boot(&app, &transport);
  updater.download_update("https://cdn/v1.zip", "h1").await.unwrap();
  updater.set_need_update("h1").unwrap();

  let updater = boot(&app, &transport);
  updater.resolve_bundle_to_load();
  updater.mark_success().unwrap();

  for _ in 0..3 {
    let updater = boot(&app, &transport);
    assert_eq!(updater.resolve_bundle_to_load(), app.bundle("h1"));
    assert!(!updater.constants().is_rolled_back);
  }
}

#[tokio::test]
async fn package_upgrade_discards_downloads() {
  let app = App::install("1.0.0");
  let transport = MemoryTransport::default();
  transport.serve("https://cdn/v1.zip", &[(BUNDLE_FILENAME, V1)]);

  let updater = boot(&app, &transport);
  updater.download_update("https://cdn/v1.zip", "h1").await.unwrap();
  updater.set_need_update("h1").unwrap();
  boot(&app, &transport).resolve_bundle_to_load();

  let upgraded = Updater::with_transport(app.upgraded("1.1.0"), transport.clone());
  assert_eq!(upgraded.resolve_bundle_to_load(), app.config.embedded_bundle);
  let constants = upgraded.constants();

  assert_eq!(constants.current_version, None);
  assert_eq!(constants.package_version, "1.1.0");
  assert!(app.store_entries().is_empty());
}

#[tokio::test]
async fn progress_reaches_subscribers() {
  let app = App::install("1.0.0");
  let transport = MemoryTransport::default();
  transport.serve("https://cdn/v1.zip", &[(BUNDLE_FILENAME, V1)]);
  let updater = boot(&app, &transport);
  let mut rx = updater.subscribe();

  updater.download_update("https://cdn/v1.zip", "h1").await.unwrap();

  let first = rx.recv().await.unwrap();
  let last = rx.recv().await.unwrap();
  assert_eq!(first.hash, "h1");
  assert!(first.received < last.received);
  assert_eq!(Some(last.received), last.total);
}

#[tokio::test]
async fn transport_failure_keeps_state_untouched() {
  let app = App::install("1.0.0");
  let transport = MemoryTransport::default();
  let updater = boot(&app, &transport);

  let err = updater.download_update("https://cdn/missing.zip", "h1").await.unwrap_err();

  assert_eq!(err.code(), "TRANSPORT_ERROR");
  assert!(err.to_string().contains("HTTP 404"));
  assert!(record(&app).is_none());
  assert_eq!(updater.resolve_bundle_to_load(), app.config.embedded_bundle);
}
