//! Frontend facade.

use std::sync::Arc;

use crate::engine;
use crate::error::Result;
use crate::metrics::FRONTEND_METRICS;
use crate::process::ProcessHandle;
use crate::resolver::{self, LogicalEntity};
use hapadmin_proto::{EntityKind, StatsRecord, command};

/// A frontend as a single logical object across every process serving it.
#[derive(Debug, Clone)]
pub struct Frontend {
    name: String,
    handles: Vec<Arc<ProcessHandle>>,
}

impl Frontend {
    pub(crate) fn from_entity(entity: &LogicalEntity) -> Self {
        Self {
            name: entity.name.clone(),
            handles: entity.handles(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process indexes serving this frontend, in discovery order.
    #[must_use]
    pub fn process_nums(&self) -> Vec<u32> {
        self.handles.iter().map(|h| h.process_num()).collect()
    }

    async fn resolve(&self) -> Result<LogicalEntity> {
        resolver::resolve(&self.handles, EntityKind::Frontend, &self.name, None).await
    }

    /// Aggregated value of a frontend metric.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` for names outside the frontend scope; otherwise
    /// transport, `EntityNotFound`, or `InconsistentResult` errors.
    pub async fn metric(&self, name: &str) -> Result<i64> {
        let entity = self.resolve().await?;
        engine::aggregate(&entity, name, FRONTEND_METRICS)
    }

    /// Total requests handled, summed across processes.
    ///
    /// # Errors
    ///
    /// See [`Frontend::metric`].
    pub async fn requests(&self) -> Result<i64> {
        self.metric("req_tot").await
    }

    /// Configured maximum connections, summed across processes.
    ///
    /// # Errors
    ///
    /// See [`Frontend::metric`].
    pub async fn maxconn(&self) -> Result<i64> {
        self.metric("slim").await
    }

    /// Frontend status (`OPEN`, `STOP`, ...), which every process must agree
    /// on.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn status(&self) -> Result<String> {
        let entity = self.resolve().await?;
        engine::uniform_field(&entity, "status")
    }

    /// Per-process request totals.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub async fn requests_per_process(&self) -> Result<Vec<(u32, Option<i64>)>> {
        let entity = self.resolve().await?;
        Ok(engine::per_process(&entity, "req_tot"))
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

    /// Stop accepting new connections on every serving process.
    ///
    /// # Errors
    ///
    /// `CommandFailed` when every process rejects; `InconsistentResult` when
    /// only a subset applied the change.
    pub async fn disable(&self) -> Result<()> {
        let cmd = command::disable_frontend(&self.name);
        engine::dispatch(&self.name, &self.handles, &cmd, &[]).await
    }

    /// Resume accepting connections on every serving process.
    ///
    /// # Errors
    ///
    /// See [`Frontend::disable`].
    pub async fn enable(&self) -> Result<()> {
        let cmd = command::enable_frontend(&self.name);
        engine::dispatch(&self.name, &self.handles, &cmd, &[]).await
    }

    /// Remove the frontend from the running configuration. Further
    /// operations on it will fail.
    ///
    /// # Errors
    ///
    /// See [`Frontend::disable`].
    pub async fn shutdown(&self) -> Result<()> {
        let cmd = command::shutdown_frontend(&self.name);
        engine::dispatch(&self.name, &self.handles, &cmd, &[]).await
    }

    /// Set the per-process maximum connection count.
    ///
    /// # Errors
    ///
    /// See [`Frontend::disable`].
    pub async fn set_maxconn(&self, value: u64) -> Result<()> {
        let cmd = command::set_maxconn_frontend(&self.name, value);
        engine::dispatch(&self.name, &self.handles, &cmd, &[]).await
    }
}
