//! Lifecycle controller: one run from start to drained.
//!
//! ```text
//! Initializing ──> Running ──> Draining ──> Done
//!                    │  deadline expired or stop requested
//!                    └─> shutdown signal fires
//! ```
//!
//! - **Initializing**: configuration validated, empty aggregator created, the
//!   shutdown signal armed with `now + runtime` as its deadline.
//! - **Running**: workers dispatched and the report task spawned.
//! - **Draining**: the signal has fired. Workers finish the attempt they are in
//!   (bounded by the attempt timeout) and stop; the controller joins every
//!   worker handle and the report task.
//! - **Done**: nothing can touch the aggregator any more; the final snapshot is
//!   taken and returned in a [`RunSummary`].
//!
//! The current phase is published on a `watch` channel, see
//! [`Controller::phase`].

use std::sync::Arc;

use chrono::{DateTime, Local};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Notify, watch};

use crate::{
    aggregate::{Aggregator, Snapshot, TargetStats},
    config::RunConfig,
    error::Result,
    executor::{Dispatcher, ExecutionContext},
    report::{Reporter, report_task},
    signal::Shutdown,
    target::Target,
    transport::Transport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    Running,
    Draining,
    Done,
}

/// Ends a run before its deadline.
///
/// Cloneable; stopping more than once, or after the run ended, does nothing.
#[derive(Clone, Debug)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        // notify_one keeps a permit if the controller is not waiting yet.
        self.notify.notify_one();
    }
}

/// Outcome of a finished run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    /// Counters after every worker finished.
    pub snapshot: Snapshot,
    pub deadline: DateTime<Local>,
    /// The run was stopped through a [`StopHandle`] before its deadline.
    pub stopped_early: bool,
    pub workers: usize,
    /// Workers that stopped because their retry policy gave up.
    pub gave_up: usize,
    /// Workers that panicked; their counts up to the panic are in the snapshot.
    pub panicked: usize,
    /// Sum of what the workers that returned normally reported.
    pub worker_totals: TargetStats,
    pub reports: usize,
}

/// Drives one run over a transport and a reporter.
pub struct Controller<T, R> {
    config: RunConfig,
    transport: Arc<T>,
    reporter: Arc<R>,
    phase: watch::Sender<Phase>,
    stop: Arc<Notify>,
}

impl<T: Transport, R: Reporter> Controller<T, R> {
    pub fn new(config: RunConfig, transport: T, reporter: R) -> Self {
        Self::with_shared(config, Arc::new(transport), Arc::new(reporter))
    }

    /// Like [`Controller::new`], for a transport and reporter the caller keeps
    /// a handle on.
    pub fn with_shared(config: RunConfig, transport: Arc<T>, reporter: Arc<R>) -> Self {
        let (phase, _) = watch::channel(Phase::Initializing);
        Self {
            config,
            transport,
            reporter,
            phase,
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            notify: self.stop.clone(),
        }
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!("Entering phase {phase:?}");
        self.phase.send_replace(phase);
    }

    /// Run against `targets` until the deadline (or a stop request), then
    /// drain and return the summary.
    pub async fn run(self, targets: Vec<Target>) -> Result<RunSummary> {
        self.config.validate()?;
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(self.config.runtime);
        let deadline = shutdown.deadline();

        let ctx = ExecutionContext {
            aggregator: aggregator.clone(),
            signal: shutdown.signal(),
            retry: self.config.retry,
            timeout: self.config.timeout,
            debug: self.config.debug,
        };
        let dispatcher = Dispatcher::new(ctx, self.transport.clone(), self.config.parallelism);
        let handles = dispatcher.dispatch(&targets);
        let workers = handles.len();

        tracing::info!("Spawning report task...");
        let reports = tokio::spawn(report_task(
            shutdown.signal(),
            aggregator.clone(),
            self.reporter.clone(),
            self.config.report_interval,
        ));

        self.enter(Phase::Running);
        tracing::info!(
            "Running {workers} workers until {}",
            deadline.wall.to_rfc2822()
        );
        let stopped_early = tokio::select! {
            _ = shutdown.expired() => false,
            _ = self.stop.notified() => true,
        };
        if stopped_early {
            tracing::info!("Stop requested, signaling shutdown...");
        } else {
            tracing::info!("Deadline reached, signaling shutdown...");
        }
        shutdown.fire();
        self.enter(Phase::Draining);

        tracing::info!("Waiting for {workers} workers to finish their last attempt...");
        let mut worker_totals = TargetStats::default();
        let mut gave_up = 0;
        let mut panicked = 0;
        for res in join_all(handles).await {
            match res {
                Ok(stats) => {
                    worker_totals.merge(stats.as_target_stats());
                    gave_up += usize::from(stats.gave_up);
                }
                Err(e) => {
                    tracing::error!("Worker panicked with error: {e}");
                    panicked += 1;
                }
            }
        }
        let reports = reports.await.unwrap_or_else(|e| {
            tracing::error!("Report task panicked with error: {e}");
            0
        });

        let snapshot = aggregator.snapshot();
        self.enter(Phase::Done);
        let totals = snapshot.totals();
        tracing::info!(
            "Run finished: {} attempts, {} succeeded, {} failed",
            totals.total(),
            totals.success,
            totals.failure
        );

        Ok(RunSummary {
            snapshot,
            deadline: deadline.wall,
            stopped_early,
            workers,
            gave_up,
            panicked,
            worker_totals,
            reports,
        })
    }
}
