//! The controller: entry point binding discovery, resolution, and dispatch
//! together behind one object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::discovery;
use crate::engine::{self, ProcessOutcome};
use crate::error::{Error, Result};
use crate::frontend::Frontend;
use crate::member::PoolMember;
use crate::metrics::{self, DAEMON_METRICS};
use crate::pool::Pool;
use crate::process::ProcessHandle;
use crate::resolver;
use hapadmin_proto::{EntityKind, Transport, command};

/// Connection policy applied to every discovered socket.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Per-exchange timeout.
    pub timeout: Duration,
    /// Attempts for connect/transport failures.
    pub retry: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: hapadmin_proto::DEFAULT_TIMEOUT,
            retry: hapadmin_proto::DEFAULT_RETRY,
        }
    }
}

impl ConnectOptions {
    fn transport(self) -> Transport {
        Transport::new(self.timeout, self.retry)
    }
}

/// Where the controller found its candidate sockets, kept so discovery can be
/// re-run after a daemon reload.
#[derive(Debug, Clone)]
enum Source {
    Dir(PathBuf),
    Paths(Vec<PathBuf>),
}

/// Administers one multi-process daemon on the local host.
///
/// Holds the set of process handles built at discovery; the set is read-only
/// afterwards, and handles are shared with the entity facades the controller
/// hands out. Daemon state itself is the only mutable resource, and it is
/// always re-read, never cached.
#[derive(Debug)]
pub struct Controller {
    source: Source,
    transport: Transport,
    handles: Vec<Arc<ProcessHandle>>,
}

impl Controller {
    /// Discover every admin socket in a directory (non-recursive).
    ///
    /// # Errors
    ///
    /// `NoValidSockets` when the directory yields no usable socket.
    pub async fn from_socket_dir(
        dir: impl AsRef<Path>,
        options: ConnectOptions,
    ) -> Result<Self> {
        let source = Source::Dir(dir.as_ref().to_path_buf());
        Self::build(source, options.transport()).await
    }

    /// Build from explicit socket paths.
    ///
    /// # Errors
    ///
    /// `NoValidSockets` when none of the paths is usable.
    pub async fn from_sockets(paths: Vec<PathBuf>, options: ConnectOptions) -> Result<Self> {
        Self::build(Source::Paths(paths), options.transport()).await
    }

    async fn build(source: Source, transport: Transport) -> Result<Self> {
        let handles = Self::discover(&source, transport).await?;
        info!(processes = handles.len(), "controller ready");
        Ok(Self {
            source,
            transport,
            handles,
        })
    }

    async fn discover(source: &Source, transport: Transport) -> Result<Vec<Arc<ProcessHandle>>> {
        let (candidates, searched) = match source {
            Source::Dir(dir) => {
                let candidates = discovery::scan_dir(dir).unwrap_or_else(|err| {
                    warn!(dir = %dir.display(), error = %err, "cannot scan socket directory");
                    Vec::new()
                });
                (candidates, dir.clone())
            }
            Source::Paths(paths) => {
                let searched = paths.first().cloned().unwrap_or_default();
                (paths.clone(), searched)
            }
        };

        let handles = discovery::discover(&candidates, transport).await;
        if handles.is_empty() {
            return Err(Error::NoValidSockets { searched });
        }
        Ok(handles)
    }

    /// Drop the current handle set and re-run discovery, picking up worker
    /// processes replaced by a daemon reload.
    ///
    /// # Errors
    ///
    /// `NoValidSockets` when re-discovery finds nothing; the previous handle
    /// set is kept in that case.
    pub async fn refresh(&mut self) -> Result<()> {
        let handles = Self::discover(&self.source, self.transport).await?;
        self.handles = handles;
        Ok(())
    }

    /// The discovered process handles, in discovery order.
    #[must_use]
    pub fn processes(&self) -> &[Arc<ProcessHandle>] {
        &self.handles
    }

    /// Pids of all worker processes.
    #[must_use]
    pub fn process_ids(&self) -> Vec<u32> {
        self.handles.iter().map(|h| h.identity().pid).collect()
    }

    // construction and refresh guarantee at least one handle
    fn first_handle(&self) -> &Arc<ProcessHandle> {
        &self.handles[0]
    }

    /// The `show info` snapshot of every process, in discovery order.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn info(&self) -> Result<Vec<HashMap<String, String>>> {
        let mut snapshots = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            snapshots.push(handle.info().await?);
        }
        Ok(snapshots)
    }

    /// Aggregated daemon-level metric, read from every process's info block.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` for names outside the daemon scope; otherwise
    /// transport errors.
    pub async fn metric(&self, name: &str) -> Result<i64> {
        let rule = metrics::validate(name, DAEMON_METRICS)?;
        let mut values = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            if let Some(value) = handle.info_metric(name).await? {
                values.push(value);
            }
        }
        Ok(engine::aggregate_values(rule, &values))
    }

    /// Total cumulative requests processed by all processes.
    ///
    /// # Errors
    ///
    /// See [`Controller::metric`].
    pub async fn requests(&self) -> Result<i64> {
        self.metric("CumReq").await
    }

    /// Sum of the configured per-process connection limits.
    ///
    /// # Errors
    ///
    /// See [`Controller::metric`].
    pub async fn maxconn(&self) -> Result<i64> {
        self.metric("Maxconn").await
    }

    /// Uptime string of the first process.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn uptime(&self) -> Result<String> {
        let info = self.first_handle().info().await?;
        Ok(info.get("Uptime").cloned().unwrap_or_default())
    }

    /// Daemon version, which every process must agree on.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes behind the same socket directory
    /// run different versions.
    pub async fn version(&self) -> Result<String> {
        self.uniform_info("Version").await
    }

    /// Daemon release date, which every process must agree on.
    ///
    /// # Errors
    ///
    /// See [`Controller::version`].
    pub async fn release_date(&self) -> Result<String> {
        self.uniform_info("Release_date").await
    }

    /// Configured node name, which every process must agree on.
    ///
    /// # Errors
    ///
    /// See [`Controller::version`].
    pub async fn node_name(&self) -> Result<String> {
        self.uniform_info("node").await
    }

    /// Configured description, which every process must agree on.
    ///
    /// # Errors
    ///
    /// See [`Controller::version`].
    pub async fn description(&self) -> Result<String> {
        self.uniform_info("description").await
    }

    async fn uniform_info(&self, key: &str) -> Result<String> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            let info = handle.info().await?;
            let value = info.get(key).cloned().unwrap_or_default();
            outcomes.push(ProcessOutcome::new(handle.process_num(), value, true));
        }
        match outcomes.split_first() {
            Some((first, rest)) if rest.iter().all(|o| o.reply == first.reply) => {
                Ok(first.reply.clone())
            }
            _ => Err(Error::InconsistentResult {
                entity: "daemon".to_string(),
                outcomes,
            }),
        }
    }

    /// Set the global maximum connection count on every process.
    ///
    /// # Errors
    ///
    /// `CommandFailed` when every process rejects; `InconsistentResult` on
    /// subset application.
    pub async fn set_maxconn(&self, value: u64) -> Result<()> {
        let cmd = command::set_maxconn_global(value);
        engine::dispatch("global", &self.handles, &cmd, &[]).await
    }

    /// Set the process-wide connection rate limit on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::set_maxconn`].
    pub async fn set_rate_limit_connections(&self, value: u64) -> Result<()> {
        let cmd = command::set_rate_limit_connections(value);
        engine::dispatch("global", &self.handles, &cmd, &[]).await
    }

    /// Set the process-wide session rate limit on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::set_maxconn`].
    pub async fn set_rate_limit_sessions(&self, value: u64) -> Result<()> {
        let cmd = command::set_rate_limit_sessions(value);
        engine::dispatch("global", &self.handles, &cmd, &[]).await
    }

    /// Set the process-wide SSL session rate limit on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::set_maxconn`].
    pub async fn set_rate_limit_ssl_sessions(&self, value: u64) -> Result<()> {
        let cmd = command::set_rate_limit_ssl_sessions(value);
        engine::dispatch("global", &self.handles, &cmd, &[]).await
    }

    /// Clear the max-value statistics counters; with `all`, clear every
    /// counter as if the daemon had restarted.
    ///
    /// # Errors
    ///
    /// See [`Controller::set_maxconn`].
    pub async fn clear_counters(&self, all: bool) -> Result<()> {
        let cmd = command::clear_counters(all);
        engine::dispatch("counters", &self.handles, &cmd, &[]).await
    }

    /// All frontends as logical objects.
    ///
    /// # Errors
    ///
    /// Propagates stats-fetch failures.
    pub async fn frontends(&self) -> Result<Vec<Frontend>> {
        let entities = resolver::list(&self.handles, EntityKind::Frontend, None, None).await?;
        Ok(entities.iter().map(Frontend::from_entity).collect())
    }

    /// One frontend by name.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when no process reports it.
    pub async fn frontend(&self, name: &str) -> Result<Frontend> {
        let entity = resolver::resolve(&self.handles, EntityKind::Frontend, name, None).await?;
        Ok(Frontend::from_entity(&entity))
    }

    /// All pools as logical objects.
    ///
    /// # Errors
    ///
    /// Propagates stats-fetch failures.
    pub async fn pools(&self) -> Result<Vec<Pool>> {
        let entities = resolver::list(&self.handles, EntityKind::Pool, None, None).await?;
        Ok(entities.iter().map(Pool::from_entity).collect())
    }

    /// One pool by name.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when no process reports it.
    pub async fn pool(&self, name: &str) -> Result<Pool> {
        let entity = resolver::resolve(&self.handles, EntityKind::Pool, name, None).await?;
        Ok(Pool::from_entity(&entity))
    }

    /// Every member of every pool, or of one pool when `pool` is given.
    ///
    /// # Errors
    ///
    /// Propagates stats-fetch failures.
    pub async fn members(&self, pool: Option<&str>) -> Result<Vec<PoolMember>> {
        let entities = resolver::list(&self.handles, EntityKind::Member, None, pool).await?;
        Ok(entities.iter().map(PoolMember::from_entity).collect())
    }

    /// Look up a member by name. Without a pool filter the same name may be
    /// a distinct member of several pools, so the result is always a
    /// sequence, even when it has length one.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when no pool on any process has such a member.
    pub async fn member(&self, name: &str, pool: Option<&str>) -> Result<Vec<PoolMember>> {
        let entities = resolver::list(&self.handles, EntityKind::Member, Some(name), pool).await?;
        if entities.is_empty() {
            return Err(Error::EntityNotFound {
                kind: EntityKind::Member,
                name: match pool {
                    Some(pool) => format!("{pool}/{name}"),
                    None => name.to_string(),
                },
            });
        }
        Ok(entities.iter().map(PoolMember::from_entity).collect())
    }

    /// Contents of an ACL, or the list of all ACLs when `acl` is `None`.
    /// Pattern files are shared state, so contents are read from the first
    /// process only.
    ///
    /// # Errors
    ///
    /// `CommandFailed` for an unknown identifier.
    pub async fn show_acl(&self, acl: Option<u32>) -> Result<Vec<String>> {
        self.show_listing(&command::show_acl(acl)).await
    }

    /// Add an entry to an ACL on every process.
    ///
    /// # Errors
    ///
    /// `CommandFailed` when every process rejects; `InconsistentResult` on
    /// subset application.
    pub async fn add_acl(&self, acl: u32, pattern: &str) -> Result<()> {
        let cmd = command::add_acl(acl, pattern);
        engine::dispatch(&format!("acl #{acl}"), &self.handles, &cmd, &[]).await
    }

    /// Delete the ACL entries matching `key` on every process. Deleting an
    /// entry that is already gone is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn del_acl(&self, acl: u32, key: &str) -> Result<()> {
        let cmd = command::del_acl(acl, key);
        engine::dispatch(&format!("acl #{acl}"), &self.handles, &cmd, &["Key not found."]).await
    }

    /// Remove all entries from an ACL on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn clear_acl(&self, acl: u32) -> Result<()> {
        let cmd = command::clear_acl(acl);
        engine::dispatch(&format!("acl #{acl}"), &self.handles, &cmd, &[]).await
    }

    /// Match a sample value against an ACL, reporting the first process's
    /// verdict.
    ///
    /// # Errors
    ///
    /// `CommandFailed` for an unknown identifier.
    pub async fn get_acl(&self, acl: u32, value: &str) -> Result<String> {
        let lines = self
            .first_handle()
            .checked_command(&command::get_acl(acl, value))
            .await?;
        Ok(lines.into_iter().next().unwrap_or_default())
    }

    /// Contents of a MAP, or the list of all MAPs when `map` is `None`.
    ///
    /// # Errors
    ///
    /// `CommandFailed` for an unknown identifier.
    pub async fn show_map(&self, map: Option<u32>) -> Result<Vec<String>> {
        self.show_listing(&command::show_map(map)).await
    }

    /// Add a key/value entry to a MAP on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn add_map(&self, map: u32, key: &str, value: &str) -> Result<()> {
        let cmd = command::add_map(map, key, value);
        engine::dispatch(&format!("map #{map}"), &self.handles, &cmd, &[]).await
    }

    /// Delete the MAP entries matching `key` on every process; a missing key
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn del_map(&self, map: u32, key: &str) -> Result<()> {
        let cmd = command::del_map(map, key);
        engine::dispatch(&format!("map #{map}"), &self.handles, &cmd, &["Key not found."]).await
    }

    /// Replace the value stored for `key` in a MAP on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn set_map(&self, map: u32, key: &str, value: &str) -> Result<()> {
        let cmd = command::set_map(map, key, value);
        engine::dispatch(&format!("map #{map}"), &self.handles, &cmd, &[]).await
    }

    /// Remove all entries from a MAP on every process.
    ///
    /// # Errors
    ///
    /// See [`Controller::add_acl`].
    pub async fn clear_map(&self, map: u32) -> Result<()> {
        let cmd = command::clear_map(map);
        engine::dispatch(&format!("map #{map}"), &self.handles, &cmd, &[]).await
    }

    /// Look up a MAP value, reporting the first process's verdict.
    ///
    /// # Errors
    ///
    /// `CommandFailed` for an unknown identifier.
    pub async fn get_map(&self, map: u32, value: &str) -> Result<String> {
        let lines = self
            .first_handle()
            .checked_command(&command::get_map(map, value))
            .await?;
        Ok(lines.into_iter().next().unwrap_or_default())
    }

    async fn show_listing(&self, cmd: &str) -> Result<Vec<String>> {
        let lines = self.first_handle().checked_command(cmd).await?;
        // an empty list is an empty reply, not a single blank line
        if lines.len() == 1 && lines[0].is_empty() {
            return Ok(Vec::new());
        }
        Ok(lines)
    }
}
