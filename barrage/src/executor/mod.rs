//! Executor: fan-out of workers over targets
//!
//! For every target the [`Dispatcher`] spawns a fixed pool of `parallelism`
//! tokio tasks, each running a [`Worker`] bound to that target. The pool size
//! never changes during a run: a worker is a persistent connection slot, not a
//! task per request.
//!
//! # Completion contract
//! Every spawned worker is represented by exactly one [`JoinHandle`], and
//! joining it is the worker's one and only completion signal. The lifecycle
//! controller owns those handles and joins them all while draining, which is
//! how it knows no worker can still touch the aggregator.
//!
//! # High-level flow
//! 1. The controller builds an [`ExecutionContext`] holding the aggregator,
//!    the shutdown signal and the per-worker settings.
//! 2. [`Dispatcher::dispatch`] registers each target with the aggregator (so it
//!    shows up in reports before its first attempt completes) and spawns the
//!    workers.
//! 3. Workers loop until the shutdown signal fires or their retry policy gives
//!    up, then return their [`WorkerStats`] through the join handle.
pub mod worker;
pub use worker::{Worker, WorkerStats};

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::{
    aggregate::Aggregator, retry::RetryPolicy, signal::ShutdownSignal, target::Target,
    transport::Transport,
};
use internals::*;

/// Shared state handed to every worker.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub aggregator: Arc<Aggregator>,
    pub signal: ShutdownSignal,
    pub retry: RetryPolicy,
    /// Upper bound of a single attempt, whatever the transport.
    pub timeout: Duration,
    /// Log every failed attempt.
    pub debug: bool,
}

/// Launches the worker pools.
pub struct Dispatcher<T> {
    ctx: ExecutionContext,
    transport: Arc<T>,
    parallelism: usize,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(ctx: ExecutionContext, transport: Arc<T>, parallelism: usize) -> Self {
        Self {
            ctx,
            transport,
            parallelism,
        }
    }

    /// Spawn `parallelism` workers for every target.
    ///
    /// Returns one handle per worker, `targets.len() * parallelism` in total.
    pub fn dispatch(&self, targets: &[Target]) -> Vec<JoinHandle<WorkerStats>> {
        tracing::info!(
            "Spawning {} workers for each of {} targets...",
            self.parallelism,
            targets.len()
        );
        let mut handles = Vec::with_capacity(targets.len() * self.parallelism);
        for target in targets {
            self.ctx.aggregator.register(target);
            let first_id = handles.len();
            handles.extend(spawn_workers(
                &self.ctx,
                target,
                first_id,
                self.parallelism,
                self.transport.clone(),
            ));
        }
        handles
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal components of the dispatcher.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
mod internals {
    use super::*;

    /// Spawns `count` tokio tasks, each running one [`Worker`] against `target`.
    ///
    /// Worker ids are `first_id..first_id + count`.
    pub fn spawn_workers<T: Transport>(
        ctx: &ExecutionContext,
        target: &Target,
        first_id: usize,
        count: usize,
        transport: Arc<T>,
    ) -> Vec<JoinHandle<WorkerStats>> {
        let recorder = ctx.aggregator.recorder(target);
        (first_id..first_id + count)
            .map(|id| {
                let worker = Worker::new(id, target.clone(), transport.clone(), recorder.clone(), ctx);
                tokio::spawn(worker.run())
            })
            .collect()
    }
}
