//! Builds logical entities out of per-process stats rows.
//!
//! A logical entity is the caller-facing union of one frontend, pool, or pool
//! member across every process that manages it. Resolution always starts from
//! a fresh stats table per process; nothing here is cached, since daemon
//! state changes between calls.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::process::ProcessHandle;
use hapadmin_proto::{EntityKind, StatsRecord};

/// A name plus the ordered (process, stats row) pairs reporting it.
///
/// Invariants: never empty, since zero matching processes means the entity
/// does not exist. Row order follows discovery order, so repeated aggregation
/// over the same entity is deterministic.
#[derive(Debug, Clone)]
pub struct LogicalEntity {
    pub kind: EntityKind,
    pub name: String,
    /// Owning pool, members only.
    pub pool: Option<String>,
    pub rows: Vec<(Arc<ProcessHandle>, StatsRecord)>,
}

impl LogicalEntity {
    /// Human-readable identifier: `pool/name` for members, `name` otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.pool {
            Some(pool) => format!("{pool}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// The process subset reporting this entity, in discovery order.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<ProcessHandle>> {
        self.rows.iter().map(|(handle, _)| Arc::clone(handle)).collect()
    }
}

pub(crate) type Snapshot = Vec<(Arc<ProcessHandle>, Vec<StatsRecord>)>;

/// Fetch a fresh stats table from every handle, in discovery order.
pub(crate) async fn snapshot(handles: &[Arc<ProcessHandle>]) -> Result<Snapshot> {
    let mut tables = Vec::with_capacity(handles.len());
    for handle in handles {
        let records = handle.stats().await?;
        tables.push((Arc::clone(handle), records));
    }
    Ok(tables)
}

/// Group matching rows into logical entities. Entity order is first-seen
/// order; rows within an entity keep discovery order.
pub(crate) fn collect(
    snapshot: &Snapshot,
    kind: EntityKind,
    name: Option<&str>,
    pool: Option<&str>,
) -> Vec<LogicalEntity> {
    let mut entities: Vec<LogicalEntity> = Vec::new();

    for (handle, records) in snapshot {
        for record in records {
            if record.kind != kind {
                continue;
            }
            if name.is_some_and(|n| n != record.name) {
                continue;
            }
            if pool.is_some_and(|p| Some(p) != record.pool.as_deref()) {
                continue;
            }

            let existing = entities
                .iter_mut()
                .find(|e| e.name == record.name && e.pool == record.pool);
            match existing {
                Some(entity) => entity.rows.push((Arc::clone(handle), record.clone())),
                None => entities.push(LogicalEntity {
                    kind,
                    name: record.name.clone(),
                    pool: record.pool.clone(),
                    rows: vec![(Arc::clone(handle), record.clone())],
                }),
            }
        }
    }

    entities
}

/// List entities of one kind, optionally filtered by name and owning pool.
pub(crate) async fn list(
    handles: &[Arc<ProcessHandle>],
    kind: EntityKind,
    name: Option<&str>,
    pool: Option<&str>,
) -> Result<Vec<LogicalEntity>> {
    let snapshot = snapshot(handles).await?;
    Ok(collect(&snapshot, kind, name, pool))
}

/// Resolve exactly one entity; zero matches is `EntityNotFound`.
pub(crate) async fn resolve(
    handles: &[Arc<ProcessHandle>],
    kind: EntityKind,
    name: &str,
    pool: Option<&str>,
) -> Result<LogicalEntity> {
    let mut entities = list(handles, kind, Some(name), pool).await?;
    match entities.len() {
        0 => Err(Error::EntityNotFound {
            kind,
            name: match pool {
                Some(pool) => format!("{pool}/{name}"),
                None => name.to_string(),
            },
        }),
        _ => Ok(entities.swap_remove(0)),
    }
}
