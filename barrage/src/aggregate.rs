//! Shared per-target bookkeeping.
//!
//! The [`Aggregator`] is the only mutable state shared between workers. It
//! maps each [`Target`] to a pair of atomic counters and exposes nothing but
//! increments and point-in-time [`Snapshot`]s.
//!
//! # Concurrency
//!
//! - The map sits behind an `RwLock` whose write side is only taken to insert a
//!   key that does not exist yet. Targets are normally registered up front by
//!   the dispatcher, so during a run the lock is effectively read-only.
//! - Workers do not even take the read lock per attempt: they hold a
//!   [`Recorder`], a handle on their target's counters, and increment the
//!   atomics directly.
//! - No lock is ever held across an `.await`.
//!
//! # Snapshots
//!
//! A snapshot walks the map in key order (targets order by their string form,
//! so rows come out sorted) and loads both counters of every target. Each
//! value is one the counter really held; the two counters of a pair and
//! different targets are not read at a single instant.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::target::Target;

/// Result of one completed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Counter pair of one target.
#[derive(Debug, Default)]
pub struct Counters {
    success: AtomicU64,
    failure: AtomicU64,
}

impl Counters {
    fn consume(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &self.success,
            Outcome::Failure => &self.failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> TargetStats {
        TargetStats {
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
        }
    }
}

/// Plain values of a counter pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TargetStats {
    pub success: u64,
    pub failure: u64,
}

impl TargetStats {
    /// Completed attempts.
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    /// Percentage of successful attempts, `None` before the first attempt
    /// completed.
    pub fn success_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(100.0 * self.success as f64 / total as f64),
        }
    }

    /// Add another pair into this one.
    pub fn merge(&mut self, other: Self) {
        self.success += other.success;
        self.failure += other.failure;
    }
}

/// Handle on the counters of a single target.
///
/// Cheap to clone; recording through it never touches the aggregator's map.
#[derive(Clone, Debug)]
pub struct Recorder {
    counters: Arc<Counters>,
}

impl Recorder {
    pub fn record(&self, outcome: Outcome) {
        self.counters.consume(outcome);
    }

    pub fn record_success(&self) {
        self.record(Outcome::Success);
    }

    pub fn record_failure(&self) {
        self.record(Outcome::Failure);
    }
}

/// Concurrency-safe store of per-target success and failure counts.
#[derive(Debug, Default)]
pub struct Aggregator {
    counters: RwLock<BTreeMap<Target, Arc<Counters>>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `target` show up in snapshots with zero counts. Idempotent.
    pub fn register(&self, target: &Target) {
        self.counters_for(target);
    }

    /// Handle for recording outcomes of `target`, registering it if needed.
    pub fn recorder(&self, target: &Target) -> Recorder {
        Recorder {
            counters: self.counters_for(target),
        }
    }

    pub fn consume(&self, target: &Target, outcome: Outcome) {
        self.counters_for(target).consume(outcome);
    }

    pub fn record_success(&self, target: &Target) {
        self.consume(target, Outcome::Success);
    }

    pub fn record_failure(&self, target: &Target) {
        self.consume(target, Outcome::Failure);
    }

    /// Counters of every known target, sorted by target.
    pub fn snapshot(&self) -> Snapshot {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        let rows = counters
            .iter()
            .map(|(target, counters)| SnapshotRow {
                target: target.clone(),
                stats: counters.load(),
            })
            .collect();
        Snapshot {
            taken_at: Local::now(),
            rows,
        }
    }

    fn counters_for(&self, target: &Target) -> Arc<Counters> {
        if let Some(counters) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            return counters.clone();
        }
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target.clone())
            .or_default()
            .clone()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub target: Target,
    #[serde(flatten)]
    pub stats: TargetStats,
}

/// Point-in-time read of all counters.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Local>,
    /// Sorted by target string, ascending.
    pub rows: Vec<SnapshotRow>,
}

impl Snapshot {
    pub fn get(&self, target: &Target) -> Option<TargetStats> {
        self.rows
            .binary_search_by(|row| row.target.cmp(target))
            .ok()
            .map(|i| self.rows[i].stats)
    }

    /// Sum over all targets.
    pub fn totals(&self) -> TargetStats {
        let mut totals = TargetStats::default();
        for row in &self.rows {
            totals.merge(row.stats);
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether both snapshots hold the same counts, ignoring when they were taken.
    pub fn same_counts(&self, other: &Snapshot) -> bool {
        self.rows == other.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn target(s: &str) -> Target {
        Target::parse(s).unwrap()
    }

    #[test]
    fn empty_aggregator_has_empty_snapshot() {
        let agg = Aggregator::new();
        let snap = agg.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.totals(), TargetStats::default());
    }

    #[test]
    fn registered_targets_show_zero_counts() {
        let agg = Aggregator::new();
        let t = target("http://a.example");
        agg.register(&t);
        agg.register(&t);
        let snap = agg.snapshot();
        assert_eq!(snap.rows.len(), 1);
        assert_eq!(snap.get(&t), Some(TargetStats::default()));
        assert_eq!(snap.get(&t).unwrap().success_rate(), None);
    }

    #[test]
    fn keys_are_created_lazily() {
        let agg = Aggregator::new();
        let t = target("http://lazy.example");
        agg.record_failure(&t);
        agg.record_success(&t);
        agg.record_success(&t);
        assert_eq!(
            agg.snapshot().get(&t),
            Some(TargetStats {
                success: 2,
                failure: 1
            })
        );
    }

    #[test]
    fn rows_are_sorted_by_target_string() {
        let agg = Aggregator::new();
        let inputs = [
            "https://zeta.example/",
            "http://b.example/Path",
            "http://b.example/path",
            "http://b.example/path?x=1",
            "http://b.example/%7Euser",
            "http://a-b.example/",
            "http://a.example:8080/",
            "http://a.example/_",
            "http://1.example/",
        ];
        for s in inputs {
            agg.record_success(&target(s));
        }
        let rows: Vec<String> = agg
            .snapshot()
            .rows
            .iter()
            .map(|r| r.target.to_string())
            .collect();
        let mut expected: Vec<String> = inputs.iter().map(|s| target(s).to_string()).collect();
        expected.sort();
        assert_eq!(rows, expected);
    }

    #[test]
    fn two_snapshots_without_attempts_are_identical() {
        let agg = Aggregator::new();
        let t = target("http://a.example");
        agg.record_success(&t);
        agg.record_failure(&target("http://b.example"));
        let first = agg.snapshot();
        let second = agg.snapshot();
        assert!(first.same_counts(&second));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let agg = Arc::new(Aggregator::new());
        let targets = [target("http://a.example"), target("http://b.example")];
        let threads = 16;
        let per_thread = 10_000u64;

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let agg = agg.clone();
                let t = targets[i % 2].clone();
                thread::spawn(move || {
                    let recorder = agg.recorder(&t);
                    for n in 0..per_thread {
                        if n % 2 == 0 {
                            recorder.record_success();
                        } else {
                            agg.record_failure(&t);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = agg.snapshot();
        for t in &targets {
            let stats = snap.get(t).unwrap();
            assert_eq!(stats.total(), per_thread * threads as u64 / 2);
            assert_eq!(stats.success, stats.failure);
        }
        assert_eq!(snap.totals().total(), per_thread * threads as u64);
    }

    #[test]
    fn alternating_outcomes_give_fifty_percent() {
        let agg = Aggregator::new();
        let t = target("http://half.example");
        for i in 0..100 {
            let outcome = if i % 2 == 0 {
                Outcome::Success
            } else {
                Outcome::Failure
            };
            agg.consume(&t, outcome);
        }
        let stats = agg.snapshot().get(&t).unwrap();
        assert_eq!(stats.total(), 100);
        assert_eq!(stats.success_rate(), Some(50.0));
    }
}
