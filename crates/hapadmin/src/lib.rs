//! Client library for administering a multi-process load-balancing daemon
//! over its per-process admin sockets.
//!
//! Each worker process of the daemon listens on its own Unix socket and knows
//! nothing about its siblings. [`Controller`] discovers those sockets, probes
//! each one for its process identity, and presents the fleet as a single
//! daemon: reads aggregate per-process values, writes fan out to every
//! process, and a write that only some processes accept surfaces as
//! [`Error::InconsistentResult`] rather than a silent partial change.
//!
//! ```no_run
//! use hapadmin::{Controller, ConnectOptions};
//!
//! # async fn run() -> hapadmin::Result<()> {
//! let lb = Controller::from_socket_dir("/run/lb", ConnectOptions::default()).await?;
//! println!("requests so far: {}", lb.requests().await?);
//!
//! let pool = lb.pool("app-pool").await?;
//! for member in pool.members(None).await? {
//!     println!("{}: {:?}", member.name(), member.status().await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod frontend;
pub mod member;
pub mod metrics;
pub mod pool;
pub mod process;

mod discovery;
mod engine;
mod error;
mod resolver;

pub use controller::{ConnectOptions, Controller};
pub use engine::ProcessOutcome;
pub use error::{Error, Result};
pub use frontend::Frontend;
pub use member::{PoolMember, Weight};
pub use metrics::{
    Aggregation, DAEMON_METRICS, FRONTEND_METRICS, MEMBER_METRICS, POOL_METRICS,
};
pub use pool::Pool;
pub use process::{ProcessHandle, ProcessIdentity};
pub use resolver::LogicalEntity;

pub use hapadmin_proto::{EntityKind, ServerState, StatsRecord, Transport};
