//! Reports and Reporters
//!
//! A [`SnapshotReport`] is the processed form of an aggregator
//! [`Snapshot`]: rows with a derived [`SuccessRate`], plus the deadline the
//! numbers are heading towards. It is pure data; turning it into output is the
//! job of a [`Reporter`].
//!
//! [`report_task`] is the live loop: every interval it snapshots the
//! aggregator and hands the result to a reporter, until the shutdown signal
//! fires.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::{
    aggregate::{Aggregator, Snapshot, TargetStats},
    error::Result,
    signal::{Deadline, ShutdownSignal},
};

#[cfg(feature = "builtins")]
mod builtins;
#[cfg(feature = "builtins")]
pub use builtins::*;

/// Column headers of the report table.
pub const HEADERS: [&str; 3] = ["URL", "Success rate (%)", "# of requests"];

/// Same layout as `date`'s default output.
const UNIX_DATE: &str = "%a %b %e %H:%M:%S %Z %Y";

/// Share of successful attempts for one target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SuccessRate {
    /// Percentage in `0.0..=100.0`.
    Rate(f64),
    /// No attempt has completed yet.
    NotAvailable,
}

impl From<TargetStats> for SuccessRate {
    fn from(stats: TargetStats) -> Self {
        stats
            .success_rate()
            .map_or(SuccessRate::NotAvailable, SuccessRate::Rate)
    }
}

impl fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessRate::Rate(rate) => write!(f, "{rate:.2}"),
            SuccessRate::NotAvailable => f.write_str("n/a"),
        }
    }
}

impl Serialize for SuccessRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SuccessRate::Rate(rate) => serializer.serialize_f64(*rate),
            SuccessRate::NotAvailable => serializer.serialize_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub url: String,
    pub success_rate: SuccessRate,
    pub requests: u64,
    pub success: u64,
    pub failure: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SnapshotReport {
    pub taken_at: DateTime<Local>,
    /// Sorted by URL, ascending.
    pub rows: Vec<ReportRow>,
    /// End of the run; absent once the run is over.
    pub deadline: Option<DateTime<Local>>,
    /// Time left until `deadline` when the report was built.
    pub remaining: Option<Duration>,
}

impl From<Snapshot> for SnapshotReport {
    fn from(snapshot: Snapshot) -> Self {
        let rows = snapshot
            .rows
            .into_iter()
            .map(|row| ReportRow {
                url: row.target.to_string(),
                success_rate: row.stats.into(),
                requests: row.stats.total(),
                success: row.stats.success,
                failure: row.stats.failure,
            })
            .collect();
        Self {
            taken_at: snapshot.taken_at,
            rows,
            deadline: None,
            remaining: None,
        }
    }
}

impl SnapshotReport {
    pub fn with_deadline(mut self, deadline: &Deadline) -> Self {
        self.deadline = Some(deadline.wall);
        self.remaining = Some(deadline.remaining());
        self
    }

    /// Render as an aligned text table followed by a status line.
    pub fn to_table(&self) -> String {
        let cells: Vec<[String; 3]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    row.url.clone(),
                    row.success_rate.to_string(),
                    row.requests.to_string(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let mut out = String::new();
        push_line(&mut out, &HEADERS, &widths);
        for row in &cells {
            push_line(&mut out, row, &widths);
        }
        out.push('\n');
        out.push_str(&self.status_line());
        out.push('\n');
        out
    }

    fn status_line(&self) -> String {
        match (self.deadline, self.remaining) {
            (Some(deadline), Some(remaining)) => format!(
                "Running until: {} ({} left)",
                deadline.format(UNIX_DATE),
                humantime::format_duration(Duration::from_secs(remaining.as_secs()))
            ),
            (Some(deadline), None) => format!("Running until: {}", deadline.format(UNIX_DATE)),
            (None, _) => format!("Finished at: {}", self.taken_at.format(UNIX_DATE)),
        }
    }
}

fn push_line<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let last = cells.len() - 1;
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let cell = cell.as_ref();
        if i == last {
            out.push_str(cell);
        } else {
            out.push_str(&format!("{cell:<width$}  "));
        }
    }
    out.push('\n');
}

/// Sends reports somewhere: a terminal, a file, a collector.
///
/// Reporters are the I/O boundary; everything before them is pure data.
pub trait Reporter: Send + Sync + 'static {
    fn report(&self, report: &SnapshotReport) -> impl Future<Output = Result<()>> + Send;
}

/// Live reporting loop.
///
/// Waits `interval`, snapshots the aggregator and hands the report to
/// `reporter`, until the signal fires. Reporter failures are logged and the
/// loop goes on.
pub async fn report_task<R: Reporter>(
    mut signal: ShutdownSignal,
    aggregator: Arc<Aggregator>,
    reporter: Arc<R>,
    interval: Duration,
) -> usize {
    let deadline = signal.deadline();
    let mut reports = 0;
    tracing::debug!("Report task started.");
    loop {
        tokio::select! {
            biased;
            _ = signal.fired() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let report = SnapshotReport::from(aggregator.snapshot()).with_deadline(&deadline);
        if let Err(e) = reporter.report(&report).await {
            tracing::error!("Reporter failed: {e}");
        }
        reports += 1;
    }
    tracing::debug!("Report task finished after {reports} reports.");
    reports
}
