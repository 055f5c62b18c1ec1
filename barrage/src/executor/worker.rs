use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    aggregate::{Recorder, TargetStats},
    retry::{RetryPolicy, RetryStep},
    signal::ShutdownSignal,
    target::Target,
    transport::{Transport, TransportError},
};

use super::ExecutionContext;

/// What one worker did during its lifetime.
#[derive(Clone, Debug, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub target: Target,
    pub successes: u64,
    pub failures: u64,
    /// The retry policy made this worker stop before the run ended.
    pub gave_up: bool,
}

impl WorkerStats {
    fn new(id: usize, target: Target) -> Self {
        Self {
            id,
            target,
            successes: 0,
            failures: 0,
            gave_up: false,
        }
    }

    pub fn attempts(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn as_target_stats(&self) -> TargetStats {
        TargetStats {
            success: self.successes,
            failure: self.failures,
        }
    }
}

/// One persistent logical connection slot against one target.
///
/// The worker checks the shutdown signal before every attempt and never
/// interrupts an attempt already in flight, so after the signal fires it
/// records at most one more outcome. An attempt that outlives `timeout` is
/// dropped and counted as a failure, which bounds that last outcome in time.
pub struct Worker<T> {
    id: usize,
    target: Target,
    transport: Arc<T>,
    recorder: Recorder,
    retry: RetryPolicy,
    timeout: Duration,
    debug: bool,
    signal: ShutdownSignal,
}

impl<T: Transport> Worker<T> {
    /// Settings and the shutdown signal are taken from `ctx`.
    pub fn new(
        id: usize,
        target: Target,
        transport: Arc<T>,
        recorder: Recorder,
        ctx: &ExecutionContext,
    ) -> Self {
        Self {
            id,
            target,
            transport,
            recorder,
            retry: ctx.retry,
            timeout: ctx.timeout,
            debug: ctx.debug,
            signal: ctx.signal.clone(),
        }
    }

    async fn attempt(&self) -> Result<(), TransportError> {
        tokio::time::timeout(self.timeout, self.transport.attempt(&self.target))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(self.timeout)))
    }

    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::new(self.id, self.target.clone());
        let mut consecutive_failures = 0u32;
        tracing::debug!(worker_id = self.id, target = %self.target, "Worker started");

        while !self.signal.is_fired() {
            match self.attempt().await {
                Ok(()) => {
                    self.recorder.record_success();
                    stats.successes += 1;
                    consecutive_failures = 0;
                }
                Err(e) => {
                    self.recorder.record_failure();
                    stats.failures += 1;
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if self.debug {
                        tracing::warn!(
                            worker_id = self.id,
                            target = %self.target,
                            error = %e,
                            "Attempt failed"
                        );
                    }

                    match self.retry.next_step(consecutive_failures) {
                        RetryStep::Now => {}
                        RetryStep::After(delay) => {
                            tokio::select! {
                                biased;
                                _ = self.signal.fired() => break,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        RetryStep::GiveUp => {
                            tracing::warn!(
                                worker_id = self.id,
                                target = %self.target,
                                "Giving up after {consecutive_failures} consecutive failures"
                            );
                            stats.gave_up = true;
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            worker_id = self.id,
            target = %self.target,
            successes = stats.successes,
            failures = stats.failures,
            "Worker finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate::Aggregator, signal::Shutdown, testing::ScriptedTransport};
    use tokio::time::Instant;

    fn target() -> Target {
        Target::parse("http://worker.example").unwrap()
    }

    fn context(
        aggregator: &Arc<Aggregator>,
        retry: RetryPolicy,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> ExecutionContext {
        ExecutionContext {
            aggregator: aggregator.clone(),
            signal: shutdown.signal(),
            retry,
            timeout,
            debug: true,
        }
    }

    fn worker(
        transport: Arc<ScriptedTransport>,
        aggregator: &Arc<Aggregator>,
        retry: RetryPolicy,
        shutdown: &Shutdown,
    ) -> Worker<ScriptedTransport> {
        let ctx = context(aggregator, retry, Duration::from_secs(3600), shutdown);
        Worker::new(0, target(), transport, aggregator.recorder(&target()), &ctx)
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_start_after_signal() {
        let transport = Arc::new(ScriptedTransport::always_ok(Duration::from_millis(10)));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(1));
        shutdown.fire();

        let stats = worker(transport.clone(), &aggregator, RetryPolicy::Immediate, &shutdown)
            .run()
            .await;
        assert_eq!(stats.attempts(), 0);
        assert_eq!(transport.attempts(), 0);
        assert_eq!(aggregator.snapshot().get(&target()), Some(TargetStats::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_in_flight_attempt_then_stops() {
        let transport = Arc::new(ScriptedTransport::always_ok(Duration::from_secs(5)));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(60));
        let handle = tokio::spawn(
            worker(transport.clone(), &aggregator, RetryPolicy::Immediate, &shutdown).run(),
        );

        // Fire in the middle of the third attempt.
        tokio::time::sleep(Duration::from_millis(12_500)).await;
        let fired_at = Instant::now();
        shutdown.fire();
        let stats = handle.await.unwrap();

        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 0);
        assert!(fired_at.elapsed() <= Duration::from_secs(5));
        assert_eq!(aggregator.snapshot().get(&target()).unwrap().success, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn capped_policy_gives_up() {
        let transport = Arc::new(ScriptedTransport::always_err(Duration::from_millis(10)));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(60));
        let retry = RetryPolicy::Capped {
            max_consecutive_failures: 4,
        };

        let stats = worker(transport, &aggregator, retry, &shutdown).run().await;
        assert!(stats.gave_up);
        assert_eq!(stats.failures, 4);
        assert_eq!(aggregator.snapshot().get(&target()).unwrap().failure, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_streak() {
        // fail, fail, ok, fail, fail, ok, ... never three failures in a row
        let transport = Arc::new(ScriptedTransport::new(
            vec![false, false, true],
            Duration::from_millis(10),
        ));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(1));
        let retry = RetryPolicy::Capped {
            max_consecutive_failures: 3,
        };
        let handle = tokio::spawn(worker(transport, &aggregator, retry, &shutdown).run());

        tokio::time::sleep(Duration::from_millis(305)).await;
        shutdown.fire();
        let stats = handle.await.unwrap();
        assert!(!stats.gave_up);
        assert_eq!(stats.attempts(), 31);
        assert_eq!(stats.successes, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_wait_is_cut_short_by_signal() {
        let transport = Arc::new(ScriptedTransport::always_err(Duration::from_millis(1)));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(60));
        let retry = RetryPolicy::Backoff {
            initial: Duration::from_secs(3600),
            max: Duration::from_secs(3600),
        };
        let handle = tokio::spawn(worker(transport, &aggregator, retry, &shutdown).run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let fired_at = Instant::now();
        shutdown.fire();
        let stats = handle.await.unwrap();

        assert_eq!(stats.failures, 1);
        assert!(fired_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_as_failures() {
        let transport = Arc::new(ScriptedTransport::always_ok(Duration::from_secs(10)));
        let aggregator = Arc::new(Aggregator::new());
        let shutdown = Shutdown::arm(Duration::from_secs(60));
        let ctx = context(
            &aggregator,
            RetryPolicy::Immediate,
            Duration::from_millis(400),
            &shutdown,
        );
        let recorder = aggregator.recorder(&target());
        let handle =
            tokio::spawn(Worker::new(0, target(), transport.clone(), recorder, &ctx).run());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let fired_at = Instant::now();
        shutdown.fire();
        let stats = handle.await.unwrap();

        // Timed out at 400ms and 800ms, the third attempt at 1200ms.
        assert_eq!(stats.successes, 0);
        assert_eq!(stats.failures, 3);
        assert!(fired_at.elapsed() <= Duration::from_millis(400));
        assert_eq!(transport.attempts(), 0);
        assert_eq!(aggregator.snapshot().get(&target()).unwrap().failure, 3);
    }

    #[test]
    fn transport_errors_render() {
        let err = TransportError::Other("connection reset".into());
        assert_eq!(err.to_string(), "connection reset");
        let err = TransportError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "attempt timed out after 1.5s");
    }
}
