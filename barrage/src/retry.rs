//! What a worker does after a failed attempt.
//!
//! [`RetryPolicy::Immediate`] reproduces a plain load generator: the next
//! attempt starts as soon as the previous one failed, with no pause and no
//! limit. Against a target that fails fast (connection refused, DNS errors)
//! this turns every worker into a busy loop that burns CPU and sockets on the
//! *sending* side. [`RetryPolicy::Backoff`] and [`RetryPolicy::Capped`] trade
//! some of that pressure away.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry at once, forever.
    #[default]
    Immediate,
    /// Wait `initial * 2^(n-1)` after the n-th consecutive failure, never more
    /// than `max`. A success resets the sequence.
    Backoff { initial: Duration, max: Duration },
    /// Retry at once, but give up after this many consecutive failures.
    Capped { max_consecutive_failures: u32 },
}

/// Decision taken after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryStep {
    Now,
    After(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// Decide what to do after `consecutive_failures` failures in a row
    /// (the one just recorded included, so it is at least 1).
    pub fn next_step(&self, consecutive_failures: u32) -> RetryStep {
        match *self {
            RetryPolicy::Immediate => RetryStep::Now,
            RetryPolicy::Backoff { initial, max } => {
                let exp = consecutive_failures.saturating_sub(1).min(31);
                let delay = initial
                    .checked_mul(1u32 << exp)
                    .map_or(max, |d| d.min(max));
                RetryStep::After(delay)
            }
            RetryPolicy::Capped {
                max_consecutive_failures,
            } => {
                if consecutive_failures >= max_consecutive_failures {
                    RetryStep::GiveUp
                } else {
                    RetryStep::Now
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            RetryPolicy::Immediate => Ok(()),
            RetryPolicy::Backoff { initial, max } => {
                if initial.is_zero() {
                    Err(Error::Config("backoff initial delay must be non-zero".into()))
                } else if max < initial {
                    Err(Error::Config(
                        "backoff max delay must not be below the initial delay".into(),
                    ))
                } else {
                    Ok(())
                }
            }
            RetryPolicy::Capped {
                max_consecutive_failures: 0,
            } => Err(Error::Config(
                "max consecutive failures must be at least 1".into(),
            )),
            RetryPolicy::Capped { .. } => Ok(()),
        }
    }
}
