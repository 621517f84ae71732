//! Closed registry mapping metric names to their cross-process aggregation
//! rule, plus the per-scope tables of exposed metrics.
//!
//! Every exposed metric has exactly one rule; a name outside the requested
//! scope fails fast with `UnknownMetric` instead of silently producing a
//! nonsense aggregate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a metric combines across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Add all present values.
    Sum,
    /// Sum divided by the count of reporting processes, truncated toward
    /// zero.
    Average,
}

/// Counters and gauges that are additive across processes.
const METRICS_SUM: &[&str] = &[
    "CompressBpsIn",
    "CompressBpsOut",
    "CompressBpsRateLim",
    "ConnRate",
    "ConnRateLimit",
    "CumConns",
    "CumReq",
    "CumSslConns",
    "CurrConns",
    "CurrSslConns",
    "Hard_maxconn",
    "Idle_pct",
    "MaxConnRate",
    "MaxSessRate",
    "MaxSslConns",
    "MaxSslRate",
    "MaxZlibMemUsage",
    "Maxconn",
    "Maxpipes",
    "Maxsock",
    "Memmax_MB",
    "PipesFree",
    "PipesUsed",
    "Process_num",
    "Run_queue",
    "SessRate",
    "SessRateLimit",
    "SslBackendKeyRate",
    "SslBackendMaxKeyRate",
    "SslCacheLookups",
    "SslCacheMisses",
    "SslFrontendKeyRate",
    "SslFrontendMaxKeyRate",
    "SslFrontendSessionReuse_pct",
    "SslRate",
    "SslRateLimit",
    "Tasks",
    "Ulimit-n",
    "Uptime_sec",
    "ZlibMemUsage",
    "bin",
    "bout",
    "chkdown",
    "chkfail",
    "cli_abrt",
    "comp_byp",
    "comp_in",
    "comp_out",
    "comp_rsp",
    "dreq",
    "dresp",
    "econ",
    "ereq",
    "eresp",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "lbtot",
    "qcur",
    "qmax",
    "rate",
    "rate_lim",
    "rate_max",
    "req_rate",
    "req_rate_max",
    "req_tot",
    "scur",
    "slim",
    "smax",
    "srv_abrt",
    "stot",
    "wredis",
    "wretr",
];

/// Values that only make sense averaged across processes.
const METRICS_AVG: &[&str] = &[
    "act",
    "bck",
    "check_duration",
    "ctime",
    "downtime",
    "lastchg",
    "lastsess",
    "qlimit",
    "qtime",
    "rtime",
    "throttle",
    "ttime",
    "weight",
];

/// Daemon-level metrics, read from the `show info` block of each process.
pub const DAEMON_METRICS: &[&str] = &[
    "CompressBpsIn",
    "CompressBpsOut",
    "CompressBpsRateLim",
    "ConnRate",
    "ConnRateLimit",
    "CumConns",
    "CumReq",
    "CumSslConns",
    "CurrConns",
    "CurrSslConns",
    "Hard_maxconn",
    "Idle_pct",
    "MaxConnRate",
    "MaxSessRate",
    "MaxSslConns",
    "MaxSslRate",
    "MaxZlibMemUsage",
    "Maxconn",
    "Maxpipes",
    "Maxsock",
    "Memmax_MB",
    "PipesFree",
    "PipesUsed",
    "Process_num",
    "Run_queue",
    "SessRate",
    "SessRateLimit",
    "SslBackendKeyRate",
    "SslBackendMaxKeyRate",
    "SslCacheLookups",
    "SslCacheMisses",
    "SslFrontendKeyRate",
    "SslFrontendMaxKeyRate",
    "SslFrontendSessionReuse_pct",
    "SslRate",
    "SslRateLimit",
    "Tasks",
    "Ulimit-n",
    "Uptime_sec",
    "ZlibMemUsage",
];

/// Frontend metrics from the stats table.
pub const FRONTEND_METRICS: &[&str] = &[
    "bin",
    "bout",
    "comp_byp",
    "comp_in",
    "comp_out",
    "comp_rsp",
    "dreq",
    "dresp",
    "ereq",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "rate",
    "rate_lim",
    "rate_max",
    "req_rate",
    "req_rate_max",
    "req_tot",
    "scur",
    "slim",
    "smax",
    "stot",
];

/// Pool (backend) metrics from the stats table.
pub const POOL_METRICS: &[&str] = &[
    "act",
    "bck",
    "bin",
    "bout",
    "chkdown",
    "cli_abrt",
    "comp_byp",
    "comp_in",
    "comp_out",
    "comp_rsp",
    "ctime",
    "downtime",
    "dreq",
    "dresp",
    "econ",
    "eresp",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "lastchg",
    "lastsess",
    "lbtot",
    "qcur",
    "qmax",
    "qtime",
    "rate",
    "rate_max",
    "rtime",
    "scur",
    "slim",
    "smax",
    "srv_abrt",
    "stot",
    "ttime",
    "weight",
    "wredis",
    "wretr",
];

/// Pool-member (server) metrics from the stats table.
pub const MEMBER_METRICS: &[&str] = &[
    "act",
    "bck",
    "bin",
    "bout",
    "check_duration",
    "chkdown",
    "chkfail",
    "cli_abrt",
    "ctime",
    "downtime",
    "econ",
    "eresp",
    "hrsp_1xx",
    "hrsp_2xx",
    "hrsp_3xx",
    "hrsp_4xx",
    "hrsp_5xx",
    "hrsp_other",
    "lastchg",
    "lastsess",
    "lbtot",
    "qcur",
    "qlimit",
    "qmax",
    "qtime",
    "rate",
    "rate_max",
    "rtime",
    "scur",
    "smax",
    "srv_abrt",
    "stot",
    "throttle",
    "ttime",
    "weight",
    "wredis",
    "wretr",
];

/// Aggregation rule for a metric name, regardless of scope.
#[must_use]
pub fn rule(name: &str) -> Option<Aggregation> {
    if METRICS_SUM.contains(&name) {
        Some(Aggregation::Sum)
    } else if METRICS_AVG.contains(&name) {
        Some(Aggregation::Average)
    } else {
        None
    }
}

/// Validate that `name` is exposed in `scope` and look up its rule.
pub(crate) fn validate(name: &str, scope: &'static [&'static str]) -> Result<Aggregation> {
    if !scope.contains(&name) {
        return Err(Error::UnknownMetric(name.to_string()));
    }
    rule(name).ok_or_else(|| Error::UnknownMetric(name.to_string()))
}
