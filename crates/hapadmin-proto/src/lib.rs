//! Wire protocol for the per-process admin socket of a multi-process
//! load-balancing daemon.
//!
//! Each worker process listens on its own Unix stream socket and serves one
//! exchange per connection: a single ASCII command line in, the full response
//! out. This crate provides the three pieces higher layers build on:
//!
//! - [`transport`]: one-shot connection handling with timeout and bounded
//!   retry
//! - [`command`]: builders for the command lines the daemon understands
//! - [`parse`]: decoders for the CSV stats table, `Key: Value` info blocks,
//!   and free-text ACL/MAP listings
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use hapadmin_proto::{Transport, command, parse};
//!
//! # async fn example() -> hapadmin_proto::Result<()> {
//! let transport = Transport::default();
//! let raw = transport
//!     .execute(Path::new("/run/lb/admin1.sock"), &command::show_stat())
//!     .await?;
//! for record in parse::parse_stat(&raw)? {
//!     println!("{} {}", record.kind, record.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod parse;
pub mod transport;

pub use command::ServerState;
pub use error::{Error, Result};
pub use parse::{EntityKind, StatsRecord};
pub use transport::{DEFAULT_RETRY, DEFAULT_TIMEOUT, Transport};
