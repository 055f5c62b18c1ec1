//! Barrage: a concurrent HTTP load and probe generator.
//!
//! Given a set of URLs, barrage keeps a fixed pool of workers per URL busy
//! issuing requests for a bounded amount of time, counts how many attempts
//! succeeded and failed, and reports the success rate of every URL while the
//! run is going and once it is over.
//!
//! # Architecture
//!
//! - [`Target`]: a validated absolute `http`/`https` URL. Also the key results
//!   are counted under.
//! - [`RequestTemplate`]: method and headers every request is built from. The
//!   default mimics a desktop browser.
//! - [`Transport`]: performs one attempt against a target. [`HttpTransport`]
//!   is the `reqwest`-backed implementation; tests plug in their own.
//! - [`Aggregator`]: lock-free per-target counters shared by all workers, and
//!   the consistent [`Snapshot`](aggregate::Snapshot)s taken from them.
//! - [`executor`]: spawns `parallelism` workers per target; each loops until
//!   shutdown, following its [`RetryPolicy`] on failures.
//! - [`report`]: turns snapshots into [`SnapshotReport`]s and hands them to a
//!   [`Reporter`] on a fixed interval.
//! - [`Controller`]: the lifecycle. Arms the deadline, starts everything,
//!   fires the shutdown signal, drains the workers and returns a
//!   [`RunSummary`].
//!
//! Success means the request went out, a response came back and its body was
//! read to the end before the timeout. The status code is not looked at: a
//! `503` that arrives in full is a success.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use barrage::{
//!     Controller, HttpConfig, HttpTransport, RequestTemplate, RunConfig, SnapshotReport, Target,
//!     report::ConsoleReporter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> barrage::Result<()> {
//!     let targets = vec![Target::parse("http://localhost:3000")?];
//!     let transport = HttpTransport::new(&HttpConfig::default(), RequestTemplate::browser())?;
//!     let config = RunConfig::builder()
//!         .runtime(Duration::from_secs(30))
//!         .parallelism(50)
//!         .build();
//!
//!     let summary = Controller::new(config, transport, ConsoleReporter)
//!         .run(targets)
//!         .await?;
//!     print!("{}", SnapshotReport::from(summary.snapshot).to_table());
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//!
//! - `builtins`: ready-made reporters (`TableReporter`, `ConsoleReporter`,
//!   `JsonReporter`). (Enabled by default)
//! - `internals`: exposes worker spawning helpers of the executor. Unstable.

/// Lock-free result counters
pub mod aggregate;
/// Run and HTTP client settings
pub mod config;
/// Set-up errors
pub mod error;
/// Worker pools
pub mod executor;
/// Run phases and the controller that drives them
pub mod lifecycle;
/// Reports and Reporters
pub mod report;
/// What workers do after a failed attempt
pub mod retry;
/// Deadline and shutdown broadcast
pub mod signal;
/// URLs under test
pub mod target;
/// Request method and headers
pub mod template;
/// Single attempts
pub mod transport;

#[cfg(test)]
mod testing;

pub use aggregate::{Aggregator, Snapshot, TargetStats};
pub use config::{HttpConfig, RunConfig};
pub use error::{Error, Result};
pub use lifecycle::{Controller, Phase, RunSummary, StopHandle};
pub use report::{Reporter, SnapshotReport, SuccessRate};
pub use retry::RetryPolicy;
pub use target::Target;
pub use template::RequestTemplate;
pub use transport::{HttpTransport, Transport, TransportError};
