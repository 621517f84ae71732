//! Cross-process dispatch and aggregation.
//!
//! Reads pull one metric from every process's stats row and merge it under
//! the metric's registered rule. Writes issue the same command on every
//! process of a logical entity, in discovery order, and classify each reply;
//! a success on a strict subset leaves the daemon divergent and is always
//! surfaced, never swallowed or retried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::metrics::{self, Aggregation};
use crate::process::ProcessHandle;
use crate::resolver::LogicalEntity;
use hapadmin_proto::parse;

/// Outcome of one command on one process, attributed by process identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Daemon-assigned process index.
    pub process: u32,
    /// First reply line; empty on a silent success.
    pub reply: String,
    pub success: bool,
}

impl ProcessOutcome {
    #[must_use]
    pub fn new(process: u32, reply: String, success: bool) -> Self {
        Self {
            process,
            reply,
            success,
        }
    }
}

impl std::fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.success { "ok" } else { "failed" };
        if self.reply.is_empty() {
            write!(f, "process {} {verdict}", self.process)
        } else {
            write!(f, "process {} {verdict}: {}", self.process, self.reply)
        }
    }
}

/// Merge already-extracted values under a rule. Average truncates toward
/// zero; an empty input aggregates to zero.
#[must_use]
pub(crate) fn aggregate_values(rule: Aggregation, values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().sum();
    match rule {
        Aggregation::Sum => sum,
        // i64 division truncates toward zero, matching the numeric
        // conversion rules of the wire layer
        #[allow(clippy::cast_possible_wrap)]
        Aggregation::Average => sum / values.len() as i64,
    }
}

/// Aggregate one metric across a logical entity.
///
/// An inapplicable field (empty on the wire) contributes nothing and is
/// excluded from an average's denominator. A field missing from a row that
/// should carry it means the processes disagree about the table shape, which
/// is an inconsistency, not a zero.
pub(crate) fn aggregate(
    entity: &LogicalEntity,
    name: &str,
    scope: &'static [&'static str],
) -> Result<i64> {
    let rule = metrics::validate(name, scope)?;

    let mut values = Vec::with_capacity(entity.rows.len());
    for (handle, record) in &entity.rows {
        match record.field(name) {
            None => {
                return Err(Error::InconsistentResult {
                    entity: entity.label(),
                    outcomes: vec![ProcessOutcome::new(
                        handle.process_num(),
                        format!("stats row is missing field {name}"),
                        false,
                    )],
                });
            }
            Some(raw) => {
                if let Some(value) = parse::convert(raw) {
                    values.push(value);
                }
            }
        }
    }

    let result = aggregate_values(rule, &values);
    trace!(entity = %entity.label(), metric = name, ?rule, value = result, "aggregated metric");
    Ok(result)
}

/// Read a single-valued field (status, address, ...) that every process must
/// agree on. Disagreement is an inconsistency and is reported per process.
pub(crate) fn uniform_field(entity: &LogicalEntity, name: &str) -> Result<String> {
    let mut outcomes = Vec::with_capacity(entity.rows.len());
    for (handle, record) in &entity.rows {
        let value = record.field(name).map(str::to_string).ok_or_else(|| {
            Error::InconsistentResult {
                entity: entity.label(),
                outcomes: vec![ProcessOutcome::new(
                    handle.process_num(),
                    format!("stats row is missing field {name}"),
                    false,
                )],
            }
        })?;
        outcomes.push(ProcessOutcome::new(handle.process_num(), value, true));
    }

    match outcomes.split_first() {
        None => Err(Error::EntityNotFound {
            kind: entity.kind,
            name: entity.label(),
        }),
        Some((first, rest)) if rest.iter().all(|o| o.reply == first.reply) => {
            Ok(first.reply.clone())
        }
        _ => Err(Error::InconsistentResult {
            entity: entity.label(),
            outcomes,
        }),
    }
}

/// Per-process metric values, attributed by process index.
pub(crate) fn per_process(entity: &LogicalEntity, name: &str) -> Vec<(u32, Option<i64>)> {
    entity
        .rows
        .iter()
        .map(|(handle, record)| (handle.process_num(), record.numeric(name)))
        .collect()
}

/// Issue a command on every process in discovery order and reconcile the
/// per-process outcomes.
///
/// `benign` lists reply phrases that count as success for a process where the
/// command is a no-op (for example deleting an ACL entry that is already
/// gone).
///
/// All-success with identical replies is success. Mixed success/failure, or
/// success with diverging replies, raises `InconsistentResult`. All-failure
/// propagates the first underlying error unchanged.
pub(crate) async fn dispatch(
    label: &str,
    handles: &[Arc<ProcessHandle>],
    command: &str,
    benign: &[&str],
) -> Result<()> {
    dispatch_classified(label, handles, command, |reply| {
        parse::SUCCESS_REPLIES.contains(&reply) || benign.contains(&reply)
    })
    .await
}

/// Like [`dispatch`], for commands whose success reply is a phrase rather
/// than silence (address/port changes).
pub(crate) async fn dispatch_expect(
    label: &str,
    handles: &[Arc<ProcessHandle>],
    command: &str,
    success: &regex::Regex,
) -> Result<()> {
    dispatch_classified(label, handles, command, |reply| success.is_match(reply)).await
}

async fn dispatch_classified(
    label: &str,
    handles: &[Arc<ProcessHandle>],
    command: &str,
    is_success: impl Fn(&str) -> bool,
) -> Result<()> {
    let mut outcomes: Vec<ProcessOutcome> = Vec::with_capacity(handles.len());
    let mut first_error: Option<Error> = None;

    for handle in handles {
        match handle.command(command).await {
            Ok(lines) => {
                let reply = lines.first().cloned().unwrap_or_default();
                if is_success(&reply) {
                    outcomes.push(ProcessOutcome::new(handle.process_num(), reply, true));
                } else {
                    if first_error.is_none() {
                        first_error = Some(Error::CommandFailed(reply.clone()));
                    }
                    outcomes.push(ProcessOutcome::new(handle.process_num(), reply, false));
                }
            }
            Err(err) => {
                outcomes.push(ProcessOutcome::new(
                    handle.process_num(),
                    err.to_string(),
                    false,
                ));
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    debug!(entity = label, command, ?outcomes, "dispatched command");

    let succeeded = outcomes.iter().filter(|o| o.success).count();
    match first_error {
        None => {
            // replies must also agree; same-but-different success output
            // still means the processes diverged
            let uniform = outcomes
                .windows(2)
                .all(|pair| pair[0].reply == pair[1].reply);
            if uniform {
                Ok(())
            } else {
                Err(Error::InconsistentResult {
                    entity: label.to_string(),
                    outcomes,
                })
            }
        }
        Some(err) if succeeded == 0 => Err(err),
        Some(_) => Err(Error::InconsistentResult {
            entity: label.to_string(),
            outcomes,
        }),
    }
}
