//! One-shot command transport for a single admin socket.
//!
//! The daemon serves exactly one exchange per connection: a command line in,
//! the full response out, then peer-close. The transport therefore opens a
//! fresh connection per command, enforces a timeout on both the connect and
//! the exchange, and retries connect/transport failures a bounded number of
//! times. Timeouts and command rejections are never retried.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Error, Result};

/// Default per-exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of attempts for connect/transport failures.
pub const DEFAULT_RETRY: u32 = 3;

/// Connection policy for one admin socket. Holds no connection state, so a
/// single transport is safe to share across concurrent commands.
#[derive(Debug, Clone, Copy)]
pub struct Transport {
    timeout: Duration,
    retry: u32,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: DEFAULT_RETRY,
        }
    }
}

impl Transport {
    #[must_use]
    pub fn new(timeout: Duration, retry: u32) -> Self {
        Self {
            timeout,
            retry: retry.max(1),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one command line and read the full response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` or `Error::Transport` once the retry bound is
    /// exhausted, or `Error::Timeout` immediately when an attempt exceeds the
    /// configured timeout.
    pub async fn execute(&self, path: &Path, command: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.exchange(path, command).await {
                Ok(response) => return Ok(response),
                // deterministic deadline, retrying would only stack delays
                Err(err @ Error::Timeout { .. }) => return Err(err),
                Err(err) if attempt < self.retry => {
                    debug!(
                        socket = %path.display(),
                        attempt,
                        error = %err,
                        "transport failure, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn exchange(&self, path: &Path, command: &str) -> Result<String> {
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(path))
            .await
            .map_err(|_| Error::Timeout {
                path: path.to_path_buf(),
            })?
            .map_err(|source| Error::Connect {
                path: path.to_path_buf(),
                source,
            })?;

        let io = async {
            let (mut reader, mut writer) = stream.into_split();
            writer.write_all(command.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            // half-close so the daemon sees end of input
            writer.shutdown().await?;

            let mut response = String::new();
            reader.read_to_string(&mut response).await?;
            Ok::<String, std::io::Error>(response)
        };

        tokio::time::timeout(self.timeout, io)
            .await
            .map_err(|_| Error::Timeout {
                path: path.to_path_buf(),
            })?
            .map_err(|source| Error::Transport {
                path: path.to_path_buf(),
                source,
            })
    }
}
