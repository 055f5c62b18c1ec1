//! Test doubles shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    report::{Reporter, SnapshotReport},
    target::Target,
    transport::{Transport, TransportError},
};

/// Transport whose outcomes follow a fixed script.
///
/// Every target walks the script on its own cursor, cycling when it reaches
/// the end: `true` is a success, `false` a failure. Each attempt takes
/// `latency`, so tests run on paused time never spin.
pub struct ScriptedTransport {
    default: Vec<bool>,
    per_target: HashMap<String, Vec<bool>>,
    latency: Duration,
    cursors: Mutex<HashMap<String, usize>>,
    completed: Mutex<HashMap<String, u64>>,
    attempts: AtomicU64,
}

impl ScriptedTransport {
    pub fn new(script: Vec<bool>, latency: Duration) -> Self {
        assert!(!script.is_empty());
        Self {
            default: script,
            per_target: HashMap::new(),
            latency,
            cursors: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn always_ok(latency: Duration) -> Self {
        Self::new(vec![true], latency)
    }

    pub fn always_err(latency: Duration) -> Self {
        Self::new(vec![false], latency)
    }

    /// Use `script` instead of the default one for `target`.
    pub fn with_script(mut self, target: &Target, script: Vec<bool>) -> Self {
        assert!(!script.is_empty());
        self.per_target.insert(target.to_string(), script);
        self
    }

    /// Attempts that ran to completion, over all targets.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn completed(&self, target: &Target) -> u64 {
        self.completed
            .lock()
            .unwrap()
            .get(target.as_str())
            .copied()
            .unwrap_or(0)
    }
}

impl Transport for ScriptedTransport {
    async fn attempt(&self, target: &Target) -> Result<(), TransportError> {
        tokio::time::sleep(self.latency).await;

        let key = target.as_str();
        let script = self.per_target.get(key).unwrap_or(&self.default);
        let success = {
            let mut cursors = self.cursors.lock().unwrap();
            let cursor = cursors.entry(key.to_string()).or_insert(0);
            let success = script[*cursor % script.len()];
            *cursor += 1;
            success
        };
        *self
            .completed
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if success {
            Ok(())
        } else {
            Err(TransportError::Other("scripted failure".into()))
        }
    }
}

/// Reporter that keeps every report it is handed.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<SnapshotReport>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<SnapshotReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    async fn report(&self, report: &SnapshotReport) -> crate::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}
