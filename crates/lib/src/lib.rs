//! hotpatch-lib: on-device hot-update client
//!
//! Downloads new versions of an application bundle, applies them as full
//! replacements or binary diffs, and decides on every start which version is
//! safe to load:
//! - `Updater`: the host-facing operations
//! - `rollback`: boot-time version resolution with automatic rollback
//! - `update`: download, extract and patch pipeline
//! - `patch`: diff format and copy/delete reconciliation
//! - `state`: persisted version record and flags

pub mod config;
pub mod consts;
pub mod events;
pub mod fetch;
pub mod gc;
pub mod patch;
pub mod platform;
pub mod rollback;
pub mod state;
pub mod store;
pub mod store_lock;
pub mod update;
pub mod updater;
pub mod util;

pub use config::UpdaterConfig;
pub use updater::{ReloadHost, UpdateConstants, Updater};
