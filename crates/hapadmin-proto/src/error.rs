//! Error types for the hapadmin-proto crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the wire layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connect to {path:?} failed: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("command timed out on {path:?}")]
    Timeout { path: PathBuf },

    #[error("transport failure on {path:?}: {source}")]
    Transport {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("command rejected: {0}")]
    CommandFailed(String),

    #[error("malformed response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
