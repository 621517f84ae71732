//! Pool (backend) facade.

use std::sync::Arc;

use crate::engine;
use crate::error::{Error, Result};
use crate::member::PoolMember;
use crate::metrics::POOL_METRICS;
use crate::process::ProcessHandle;
use crate::resolver::{self, LogicalEntity};
use hapadmin_proto::{EntityKind, StatsRecord};

/// A named pool of backend members, as a single logical object across every
/// process managing it.
#[derive(Debug, Clone)]
pub struct Pool {
    name: String,
    handles: Vec<Arc<ProcessHandle>>,
}

impl Pool {
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

    /// Process indexes managing this pool, in discovery order.
    #[must_use]
    pub fn process_nums(&self) -> Vec<u32> {
        self.handles.iter().map(|h| h.process_num()).collect()
    }

    async fn resolve(&self) -> Result<LogicalEntity> {
        resolver::resolve(&self.handles, EntityKind::Pool, &self.name, None).await
    }

    /// Aggregated value of a pool metric.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` for names outside the pool scope; otherwise transport,
    /// `EntityNotFound`, or `InconsistentResult` errors.
    pub async fn metric(&self, name: &str) -> Result<i64> {
        let entity = self.resolve().await?;
        engine::aggregate(&entity, name, POOL_METRICS)
    }

    /// Total sessions routed through the pool, summed across processes.
    ///
    /// # Errors
    ///
    /// See [`Pool::metric`].
    pub async fn requests(&self) -> Result<i64> {
        self.metric("stot").await
    }

    /// Pool status, which every process must agree on.
    ///
    /// # Errors
    ///
    /// `InconsistentResult` when processes disagree.
    pub async fn status(&self) -> Result<String> {
        let entity = self.resolve().await?;
        engine::uniform_field(&entity, "status")
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

    /// All members of this pool, or the one matching `name`.
    ///
    /// # Errors
    ///
    /// Propagates stats-fetch failures.
    pub async fn members(&self, name: Option<&str>) -> Result<Vec<PoolMember>> {
        let entities =
            resolver::list(&self.handles, EntityKind::Member, name, Some(&self.name)).await?;
        Ok(entities.iter().map(PoolMember::from_entity).collect())
    }

    /// One member by name.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when no process reports the member in this pool.
    pub async fn member(&self, name: &str) -> Result<PoolMember> {
        let mut members = self.members(Some(name)).await?;
        if members.is_empty() {
            return Err(Error::EntityNotFound {
                kind: EntityKind::Member,
                name: format!("{}/{name}", self.name),
            });
        }
        Ok(members.swap_remove(0))
    }
}
