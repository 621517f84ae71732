//! Decoders for the three response shapes the daemon produces: the CSV stats
//! table, `Key: Value` info blocks, and free-text listings (ACL/MAP contents,
//! command replies).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Replies that indicate a successfully executed command. Daemons prior to
/// 1.5.10 answered `Done.` for ACL/MAP mutations; newer ones answer nothing.
pub const SUCCESS_REPLIES: &[&str] = &["", "Done."];

/// First-line phrases that mark a rejected command. Matched as prefixes since
/// several of them carry trailing detail that varies per daemon version.
const ERROR_PHRASES: &[&str] = &[
    "Unknown ACL identifier",
    "Unknown map identifier",
    "Unknown command",
    "Unknown action",
    "Malformed identifier",
    "Missing ACL identifier",
    "Missing map identifier",
    "Invalid key",
    "Key not found",
    "Key value expected",
    "Integer value expected",
    "Expects an integer value",
    "Value out of range",
    "Permission denied",
    "Out of memory error",
    "No such backend",
    "No such frontend",
    "No such server",
    "No such session",
    "Require 'backend/server'",
    "Frontend is already enabled",
    "Frontend is already disabled",
    "Frontend was already shut down",
    "Frontend was previously shut down",
    "Failed to pause frontend",
    "Failed to resume frontend",
    "Proxy is disabled",
    "A frontend name is expected",
    "cannot change health on a tracking server",
    "'add acl' expects two parameters",
    "'add map' expects three parameters",
    "'set map' expects three parameters",
    "'set maxconn' only supports",
    "'set rate-limit",
    "'set server",
    "'del' only supports",
    "'disable' only supports",
    "'enable' only supports",
    "'shutdown' only supports",
    "'shutdown sessions' only supports",
    "This ACL is shared with a map",
    "This command expects two parameters",
    "Entry currently in use, cannot remove",
];

/// What kind of entity a stats-table row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Frontend,
    Pool,
    Member,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Frontend => "frontend",
            EntityKind::Pool => "pool",
            EntityKind::Member => "member",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded stats-table row: a field-name to value map tagged with the
/// entity it describes. Ephemeral; rebuilt on every stats fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRecord {
    pub kind: EntityKind,
    pub name: String,
    /// Owning pool, only set for members.
    pub pool: Option<String>,
    fields: HashMap<String, String>,
}

impl StatsRecord {
    /// Raw field value. `None` means the column is absent from the table,
    /// `Some("")` means the daemon reported it as not applicable.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value converted to an integer, truncating toward zero.
    /// Inapplicable and non-numeric fields yield `None`.
    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(convert)
    }
}

/// Convert a stats field to an integer, truncating toward zero. Empty fields
/// (the daemon's "not applicable" sentinel) and non-numeric text yield `None`.
#[must_use]
pub fn convert(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    // Rates may be reported with a fractional part; truncate, never round.
    #[allow(clippy::cast_possible_truncation)]
    value.parse::<f64>().ok().map(|f| f.trunc() as i64)
}

/// Split a raw response into lines, discarding the trailing blank terminator
/// the daemon appends to multi-line output.
#[must_use]
pub fn split_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw.split('\n').map(str::to_string).collect();
    while lines.len() > 1 && lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Return `true` if a reply line matches a known daemon error phrase.
#[must_use]
pub fn is_error_reply(line: &str) -> bool {
    let line = line.trim();
    ERROR_PHRASES.iter().any(|phrase| line.starts_with(phrase))
}

/// Validate a free-text reply, surfacing a daemon rejection as
/// [`Error::CommandFailed`] carrying the daemon's text.
///
/// # Errors
///
/// Returns `Error::CommandFailed` when the first line matches a known error
/// phrase.
pub fn check_reply(lines: &[String]) -> Result<()> {
    match lines.first() {
        Some(first) if is_error_reply(first) => Err(Error::CommandFailed(first.clone())),
        _ => Ok(()),
    }
}

/// Decode a `show stat` CSV table into one [`StatsRecord`] per row.
///
/// The header is a `#`-prefixed comma-separated list of field names; each row
/// follows that column order with (proxy name, entity name) first. Rows carry
/// a trailing comma which produces a harmless empty extra part.
///
/// # Errors
///
/// Returns `Error::Parse` when the header line is missing or malformed.
pub fn parse_stat(raw: &str) -> Result<Vec<StatsRecord>> {
    let lines = split_lines(raw);
    let mut iter = lines.iter();

    let header = iter
        .next()
        .filter(|line| line.starts_with('#'))
        .ok_or_else(|| Error::Parse("stats table is missing its header line".to_string()))?;
    let heads: Vec<&str> = header
        .trim_start_matches('#')
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|head| !head.is_empty())
        .collect();
    if heads.len() < 2 || heads[0] != "pxname" || heads[1] != "svname" {
        return Err(Error::Parse(format!("unexpected stats header: {header}")));
    }

    let mut records = Vec::new();
    for line in iter {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 2 {
            return Err(Error::Parse(format!("truncated stats row: {line}")));
        }
        let fields: HashMap<String, String> = heads
            .iter()
            .zip(parts.iter())
            .map(|(head, part)| ((*head).to_string(), (*part).to_string()))
            .collect();

        let (pxname, svname) = (parts[0], parts[1]);
        let record = match svname {
            "FRONTEND" => StatsRecord {
                kind: EntityKind::Frontend,
                name: pxname.to_string(),
                pool: None,
                fields,
            },
            "BACKEND" => StatsRecord {
                kind: EntityKind::Pool,
                name: pxname.to_string(),
                pool: None,
                fields,
            },
            _ => StatsRecord {
                kind: EntityKind::Member,
                name: svname.to_string(),
                pool: Some(pxname.to_string()),
                fields,
            },
        };
        records.push(record);
    }

    Ok(records)
}

/// Decode a `show info` block into a flat key/value map.
#[must_use]
pub fn parse_info(raw: &str) -> HashMap<String, String> {
    let mut info = HashMap::new();
    for line in raw.split('\n') {
        let line = line.trim_start();
        if let Some((key, value)) = line.split_once(": ") {
            info.insert(key.to_string(), value.to_string());
        }
    }
    info
}
