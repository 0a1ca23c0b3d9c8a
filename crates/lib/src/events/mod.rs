//! Progress notifications for the host.
//!
//! Events are fanned out over a broadcast channel. Nothing is built or sent
//! while no subscriber is attached.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

/// Download progress for one update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
  pub hash: String,
  pub received: u64,
  /// Unknown when the transport gets no content length.
  pub total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EventSink {
  tx: broadcast::Sender<DownloadProgress>,
}

impl Default for EventSink {
  fn default() -> Self {
    Self::new()
  }
}

impl EventSink {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { tx }
  }

  /// Attach a listener. Dropping the receiver detaches it.
  pub fn subscribe(&self) -> broadcast::Receiver<DownloadProgress> {
    self.tx.subscribe()
  }

  pub fn has_listeners(&self) -> bool {
    self.tx.receiver_count() > 0
  }

  pub fn emit_progress(&self, hash: &str, received: u64, total: Option<u64>) {
    if !self.has_listeners() {
      return;
    }
    trace!(hash, received, ?total, "download progress");
    // A listener detaching between the check and the send is harmless.
    let _ = self.tx.send(DownloadProgress {
      hash: hash.to_string(),
      received,
      total,
    });
  }
}
