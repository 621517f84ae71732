//! Unified error type for the hapadmin crate.
//!
//! Wire-layer failures are flattened into this enum so callers match on a
//! single taxonomy regardless of which layer raised the error.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::ProcessOutcome;
use hapadmin_proto::EntityKind;

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

    #[error("no process reports {kind} {name}")]
    EntityNotFound { kind: EntityKind, name: String },

    /// A write landed on a strict subset of processes, replies diverged, or a
    /// read found required data missing or differing across processes. The
    /// daemon may now be divergent; the per-process outcomes say where.
    #[error("inconsistent result for {entity}: {}", summarize(outcomes))]
    InconsistentResult {
        entity: String,
        outcomes: Vec<ProcessOutcome>,
    },

    #[error("{0} is not a known metric")]
    UnknownMetric(String),

    #[error("no valid admin socket found under {searched:?}")]
    NoValidSockets { searched: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hapadmin_proto::Error> for Error {
    fn from(e: hapadmin_proto::Error) -> Self {
        match e {
            hapadmin_proto::Error::Connect { path, source } => Self::Connect { path, source },
            hapadmin_proto::Error::Timeout { path } => Self::Timeout { path },
            hapadmin_proto::Error::Transport { path, source } => Self::Transport { path, source },
            hapadmin_proto::Error::CommandFailed(text) => Self::CommandFailed(text),
            hapadmin_proto::Error::Parse(text) => Self::Parse(text),
        }
    }
}

fn summarize(outcomes: &[ProcessOutcome]) -> String {
    outcomes
        .iter()
        .map(ProcessOutcome::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
