//! Download transport.
//!
//! The pipeline only needs "fetch this URL into that file and tell me how far
//! along you are". [`Transport`] is that seam; [`DefaultTransport`] serves
//! `http(s)://` through reqwest and `file://` from local disk.

pub mod archive;

use std::future::Future;
use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Progress callback: `(received, total)`; `total` is unknown for servers
/// that send no content length.
pub type ProgressFn<'a> = dyn FnMut(u64, Option<u64>) + Send + 'a;

/// Opaque download failure, passed through to the host untouched.
#[derive(Debug, Error)]
#[error("download of {url} failed: {message}")]
pub struct TransportError {
  pub url: String,
  pub message: String,
}

impl TransportError {
  pub fn new(url: &str, message: impl ToString) -> Self {
    Self {
      url: url.to_string(),
      message: message.to_string(),
    }
  }
}

pub trait Transport: Send + Sync {
  /// Download `url` into `dest`, reporting progress as bytes arrive.
  ///
  /// Returns the number of bytes written.
  fn download(
    &self,
    url: &str,
    dest: &Path,
    on_progress: &mut ProgressFn<'_>,
  ) -> impl Future<Output = Result<u64, TransportError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultTransport {
  client: reqwest::Client,
}

impl DefaultTransport {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client }
  }

  async fn download_http(&self, url: &str, dest: &Path, on_progress: &mut ProgressFn<'_>) -> Result<u64, TransportError> {
    let mut response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| TransportError::new(url, e))?;

    if !response.status().is_success() {
      return Err(TransportError::new(url, format!("HTTP {}", response.status())));
    }

    let total = response.content_length();
    let mut file = fs::File::create(dest).await.map_err(|e| TransportError::new(url, e))?;
    let mut received = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(|e| TransportError::new(url, e))? {
      file.write_all(&chunk).await.map_err(|e| TransportError::new(url, e))?;
      received += chunk.len() as u64;
      on_progress(received, total);
    }
    file.flush().await.map_err(|e| TransportError::new(url, e))?;

    Ok(received)
  }

  async fn download_file(
    &self,
    url: &str,
    source: &Path,
    dest: &Path,
    on_progress: &mut ProgressFn<'_>,
  ) -> Result<u64, TransportError> {
    let mut input = fs::File::open(source).await.map_err(|e| TransportError::new(url, e))?;
    let total = input.metadata().await.ok().map(|m| m.len());
    let mut output = fs::File::create(dest).await.map_err(|e| TransportError::new(url, e))?;

    let mut buf = vec![0u8; 64 * 1024];
    let mut received = 0u64;
    loop {
      let n = input.read(&mut buf).await.map_err(|e| TransportError::new(url, e))?;
      if n == 0 {
        break;
      }
      output.write_all(&buf[..n]).await.map_err(|e| TransportError::new(url, e))?;
      received += n as u64;
      on_progress(received, total);
    }
    output.flush().await.map_err(|e| TransportError::new(url, e))?;

    Ok(received)
  }
}

impl Transport for DefaultTransport {
  async fn download(&self, url: &str, dest: &Path, on_progress: &mut ProgressFn<'_>) -> Result<u64, TransportError> {
    info!(url = %url, dest = %dest.display(), "downloading");

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await.map_err(|e| TransportError::new(url, e))?;
    }

    let result = match url.strip_prefix("file://") {
      Some(local) => self.download_file(url, Path::new(local), dest, on_progress).await,
      None if url.starts_with("http://") || url.starts_with("https://") => {
        self.download_http(url, dest, on_progress).await
      }
      None => Err(TransportError::new(url, "unsupported URL scheme")),
    };

    match &result {
      Ok(size) => info!(url = %url, size, "download complete"),
      Err(e) => {
        debug!(url = %url, error = %e, "download failed, removing partial file");
        let _ = fs::remove_file(dest).await;
      }
    }
    result
  }
}
