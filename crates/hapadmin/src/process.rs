//! A handle to one worker process behind one admin socket.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use hapadmin_proto::{StatsRecord, Transport, command, parse};

/// Daemon names accepted by the identity probe.
const KNOWN_DAEMONS: &[&str] = &["HAProxy", "hapee-lb"];

/// Identity of the process behind a socket at discovery time. Used to detect
/// a socket whose backing process was since replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    /// Daemon-assigned process index (1-based).
    pub process_num: u32,
    /// Derived from the uptime the process reported at probe time; the
    /// daemon does not expose an absolute start instant.
    pub started_at: SystemTime,
}

/// One worker process: socket endpoint, probed identity, and the transport
/// used to reach it. Created at discovery, never mutated afterwards, so a
/// handle is safe to use from concurrent tasks; every command opens its own
/// connection.
#[derive(Debug)]
pub struct ProcessHandle {
    endpoint: PathBuf,
    identity: ProcessIdentity,
    transport: Transport,
}

impl ProcessHandle {
    /// Probe the socket with `show info` and build a handle if it answers
    /// with a parseable identity.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the socket is unreachable, or
    /// `Error::Parse` when the probe reply does not identify a known daemon
    /// process.
    pub(crate) async fn connect(endpoint: PathBuf, transport: Transport) -> Result<Self> {
        let raw = transport.execute(&endpoint, &command::show_info()).await?;
        let info = parse::parse_info(&raw);
        let identity = identity_from_info(&endpoint, &info)?;
        Ok(Self {
            endpoint,
            identity,
            transport,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    #[must_use]
    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    #[must_use]
    pub fn process_num(&self) -> u32 {
        self.identity.process_num
    }

    /// Fetch the `show info` key/value block.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn info(&self) -> Result<HashMap<String, String>> {
        let raw = self
            .transport
            .execute(&self.endpoint, &command::show_info())
            .await?;
        Ok(parse::parse_info(&raw))
    }

    /// Fetch and decode the full stats table.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and table parse errors.
    pub async fn stats(&self) -> Result<Vec<StatsRecord>> {
        let raw = self
            .transport
            .execute(&self.endpoint, &command::show_stat())
            .await?;
        Ok(parse::parse_stat(&raw)?)
    }

    /// Run a command and return the raw reply lines, trailing blank stripped.
    /// No success/error classification is applied; that is the dispatcher's
    /// job so partial failures stay attributable.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn command(&self, command: &str) -> Result<Vec<String>> {
        let raw = self.transport.execute(&self.endpoint, command).await?;
        Ok(parse::split_lines(&raw))
    }

    /// Run a free-text command, surfacing a daemon rejection as
    /// `CommandFailed`.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and daemon rejections.
    pub async fn checked_command(&self, command: &str) -> Result<Vec<String>> {
        let lines = self.command(command).await?;
        parse::check_reply(&lines)?;
        Ok(lines)
    }

    /// One numeric field from `show info`. `None` when the daemon reports
    /// the key as non-numeric or not at all.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn info_metric(&self, name: &str) -> Result<Option<i64>> {
        let info = self.info().await?;
        Ok(info.get(name).map(String::as_str).and_then(parse::convert))
    }
}

fn identity_from_info(
    endpoint: &Path,
    info: &HashMap<String, String>,
) -> Result<ProcessIdentity> {
    match info.get("Name").map(String::as_str) {
        Some(name) if KNOWN_DAEMONS.contains(&name) => {}
        _ => {
            return Err(Error::Parse(format!(
                "{} did not identify as a known daemon",
                endpoint.display()
            )));
        }
    }

    let pid = info
        .get("Pid")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| {
            Error::Parse(format!("{} reported no parseable pid", endpoint.display()))
        })?;
    let process_num = info
        .get("Process_num")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(1);
    let uptime = info
        .get("Uptime_sec")
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| {
            Error::Parse(format!(
                "{} reported no parseable start time",
                endpoint.display()
            ))
        })?;
    let started_at = SystemTime::now() - Duration::from_secs(uptime);

    Ok(ProcessIdentity {
        pid,
        process_num,
        started_at,
    })
}
