//! Version state persistence.
//!
//! Tracks which bundle version is active, which one it replaced, whether the
//! active one has confirmed a successful boot, and the one-shot markers the
//! host reads once after boot.

mod storage;
mod types;

pub use storage::VersionStore;
pub use types::{BlockUpdate, Flags, Marker, MarkerRead, StateError, VersionRecord};
