//! Pool member ("server") facade.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::engine;
use crate::error::{Error, Result};
use crate::metrics::MEMBER_METRICS;
use crate::process::ProcessHandle;
use crate::resolver::{self, LogicalEntity};
use hapadmin_proto::{EntityKind, ServerState, StatsRecord, command};

/// The daemon acknowledges an address change with a phrase, not silence.
static ADDRESS_CHANGED: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new("IP changed from|no need to change the addr").expect("static pattern")
});

/// A weight for a pool member: absolute, or relative to the configured
/// weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    /// Absolute weight, valid between 0 and 256.
    Absolute(u32),
    /// Percentage of the configured weight, e.g. `Percent(20)` for "20%".
    Percent(u32),
}

impl Weight {
    /// The wire form of the weight, validating the absolute range locally so
    /// an out-of-range value is rejected before touching any process.
    fn wire_value(self) -> Result<String> {
        match self {
            Weight::Absolute(value) if value <= 256 => Ok(value.to_string()),
            Weight::Absolute(value) => Err(Error::CommandFailed(format!(
                "weight {value} out of range, absolute weights are permitted between 0 and 256"
            ))),
            Weight::Percent(value) => Ok(format!("{value}%")),
        }
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weight::Absolute(value) => write!(f, "{value}"),
            Weight::Percent(value) => write!(f, "{value}%"),
        }
    }
}

impl FromStr for Weight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (digits, percent) = match s.strip_suffix('%') {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        let value = digits
            .parse::<u32>()
            .map_err(|_| Error::CommandFailed(format!("invalid weight: {s}")))?;
        Ok(if percent {
            Weight::Percent(value)
        } else {
            Weight::Absolute(value)
        })
    }
}

/// One server as a member of one pool, across every process managing that
/// pool. The same server name in another pool is a distinct member.
///
/// Holds only the name pair and the process subset that reported the member
/// at lookup time; every read re-queries the daemon, since health checks and
/// other operators change state out of band.
#[derive(Debug, Clone)]
pub struct PoolMember {
    name: String,
    pool: String,
    handles: Vec<Arc<ProcessHandle>>,
}

impl PoolMember {
    pub(crate) fn from_entity(entity: &LogicalEntity) -> Self {
        Self {
            name: entity.name.clone(),
            pool: entity.pool.clone().unwrap_or_default(),
            handles: entity.handles(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool
    }

    /// Process indexes managing this member, in discovery order.
    #[must_use]
    pub fn process_nums(&self) -> Vec<u32> {
        self.handles.iter().map(|h| h.process_num()).collect()
    }

    async fn resolve(&self) -> Result<LogicalEntity> {
        resolver::resolve(&self.handles, EntityKind::Member, &self.name, Some(&self.pool)).await
    }

    fn label(&self) -> String {
        format!("{}/{}", self.pool, self.name)
    }

    /// Aggregated value of a member metric.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` for names outside the member scope; otherwise
    /// transport, `EntityNotFound`, or `InconsistentResult` errors.
    pub async fn metric(&self, name: &str) -> Result<i64> {
        let entity = self.resolve().await?;
        engine::aggregate(&entity, name, MEMBER_METRICS)
    }

    /// Total sessions served, summed across processes.
    ///
    /// # Errors
    ///
    /// See [`PoolMember::metric`].
    pub async fn requests(&self) -> Result<i64> {
        self.metric("stot").await
    }

    /// Per-process session totals.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub async fn requests_per_process(&self) -> Result<Vec<(u32, Option<i64>)>> {
        let entity = self.resolve().await?;
        Ok(engine::per_process(&entity, "stot"))
    }

    /// Full stats row per process.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub async fn stats_per_process(&self) -> Result<Vec<(u32, StatsRecord)>> {
        let entity = self.resolve().await?;
        Ok(entity
            .rows
            .into_iter()
            .map(|(handle, record)| (handle.process_num(), record))
            .collect())
    }

    /// Health/administrative status, which every process must agree on.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn status(&self) -> Result<String> {
        let entity = self.resolve().await?;
        engine::uniform_field(&entity, "status")
    }

    /// Current effective weight.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn weight(&self) -> Result<i64> {
        let entity = self.resolve().await?;
        let raw = engine::uniform_field(&entity, "weight")?;
        hapadmin_proto::parse::convert(&raw)
            .ok_or_else(|| Error::Parse(format!("non-numeric weight: {raw}")))
    }

    /// Latest health-check status field.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn check_status(&self) -> Result<String> {
        let entity = self.resolve().await?;
        engine::uniform_field(&entity, "check_status")
    }

    /// Contents of the last health check, or its textual error.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn last_status(&self) -> Result<String> {
        let entity = self.resolve().await?;
        engine::uniform_field(&entity, "last_chk")
    }

    /// Set the administrative state on every managing process.
    ///
    /// # Errors
    ///
    /// `CommandFailed` when every process rejects; `InconsistentResult` when
    /// only a subset applied the change.
    pub async fn set_state(&self, state: ServerState) -> Result<()> {
        let cmd = command::set_server_state(&self.pool, &self.name, state);
        engine::dispatch(&self.label(), &self.handles, &cmd, &[]).await
    }

    /// Put the member back in normal rotation.
    ///
    /// # Errors
    ///
    /// See [`PoolMember::set_state`].
    pub async fn enable(&self) -> Result<()> {
        self.set_state(ServerState::Ready).await
    }

    /// Take the member out of rotation for maintenance.
    ///
    /// # Errors
    ///
    /// See [`PoolMember::set_state`].
    pub async fn disable(&self) -> Result<()> {
        self.set_state(ServerState::Maint).await
    }

    /// Change the weight. Absolute weights are validated locally (0–256,
    /// never clamped); percentages apply relative to the configured weight.
    ///
    /// # Errors
    ///
    /// `CommandFailed` for out-of-range values or daemon rejections.
    pub async fn set_weight(&self, weight: Weight) -> Result<()> {
        let value = weight.wire_value()?;
        let cmd = command::set_weight(&self.pool, &self.name, &value);
        engine::dispatch(&self.label(), &self.handles, &cmd, &[]).await
    }

    /// Change the address (and optionally the port) the member routes to.
    /// Success is verified against the daemon's acknowledgement phrase.
    ///
    /// # Errors
    ///
    /// `CommandFailed` when the daemon rejects; `InconsistentResult` on
    /// subset application.
    pub async fn set_address(&self, addr: &str, port: Option<u16>) -> Result<()> {
        let cmd = command::set_server_addr(&self.pool, &self.name, addr, port);
        engine::dispatch_expect(&self.label(), &self.handles, &cmd, &ADDRESS_CHANGED).await
    }

    /// Terminate every session attached to this member, on every process.
    ///
    /// # Errors
    ///
    /// See [`PoolMember::set_state`].
    pub async fn shutdown_sessions(&self) -> Result<()> {
        let cmd = command::shutdown_sessions(&self.pool, &self.name);
        engine::dispatch(&self.label(), &self.handles, &cmd, &[]).await
    }
}
