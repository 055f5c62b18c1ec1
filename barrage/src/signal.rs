//! Deadline-bound broadcast stop signal.
//!
//! [`Shutdown`] is owned by the lifecycle controller; every worker and the
//! report task get a [`ShutdownSignal`]. Firing is idempotent and final: once
//! fired the signal never goes back. Dropping the [`Shutdown`] without firing
//! it also counts as fired, so no task can outlive its controller waiting on a
//! signal that will never come.

use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use tokio::{sync::watch, time::Instant};

/// Upper bound used when a runtime does not fit the clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// When a run ends, on both clocks.
///
/// `instant` drives the timers, `wall` is what gets shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    pub instant: Instant,
    pub wall: DateTime<Local>,
}

impl Deadline {
    pub fn after(runtime: Duration) -> Self {
        let now = Instant::now();
        let instant = now
            .checked_add(runtime)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let wall = TimeDelta::from_std(runtime)
            .ok()
            .and_then(|delta| Local::now().checked_add_signed(delta))
            .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC.with_timezone(&Local));
        Self { instant, wall }
    }

    pub fn remaining(&self) -> Duration {
        self.instant.saturating_duration_since(Instant::now())
    }
}

/// Sending side of the stop signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    deadline: Deadline,
}

impl Shutdown {
    /// Arm a signal whose deadline is `runtime` from now. The signal does not
    /// fire by itself; the owner fires it when the deadline passes.
    pub fn arm(runtime: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            deadline: Deadline::after(runtime),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            deadline: self.deadline,
        }
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Resolves when the deadline passes.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline.instant).await;
    }
}

/// Receiving side of the stop signal. Clone one per task.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
    deadline: Deadline,
}

impl ShutdownSignal {
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the signal has fired, immediately if it already has.
    pub async fn fired(&mut self) {
        // An error means the sender is gone, which counts as fired.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}
