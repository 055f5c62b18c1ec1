//! Run configuration
//!
//! Both structs are set once before a run and only read afterwards. They are
//! built with [`TypedBuilder`] and serialize to JSON so the effective settings
//! can be logged at start-up.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    error::{Error, Result},
    retry::RetryPolicy,
};

/// Default interval between two live reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Tunables of the shared HTTP client and its connection pool.
///
/// Under high parallelism the pool is what bounds file-descriptor usage:
/// `pool_max_idle_per_host` caps idle keep-alive sockets kept per host and
/// `pool_idle_timeout` closes the ones nobody picks up.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct HttpConfig {
    /// Bound for the whole attempt (connect, request and body).
    #[builder(default = Duration::from_secs(90))]
    pub request_timeout: Duration,
    #[builder(default = Duration::from_secs(90))]
    pub connect_timeout: Duration,
    #[builder(default = Duration::from_secs(90))]
    pub pool_idle_timeout: Duration,
    #[builder(default = 1000)]
    pub pool_max_idle_per_host: usize,
    #[builder(default = Some(Duration::from_secs(90)))]
    pub tcp_keepalive: Option<Duration>,
    /// Accept invalid TLS certificates. Off unless asked for explicitly.
    #[builder(default = false)]
    pub insecure: bool,
}

impl HttpConfig {
    /// Use the same bound for every timeout, the way the `-t` flag does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.connect_timeout = timeout;
        self.pool_idle_timeout = timeout;
        self.tcp_keepalive = Some(timeout);
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything a [`crate::Controller`] needs to drive one run.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct RunConfig {
    /// How long the run lasts, measured from the start of `Controller::run`.
    #[builder(default = Duration::from_secs(60 * 60))]
    pub runtime: Duration,
    /// Workers per target.
    #[builder(default = 1000)]
    pub parallelism: usize,
    /// Per-attempt timeout; also the upper bound of shutdown latency.
    #[builder(default = Duration::from_secs(90))]
    pub timeout: Duration,
    /// Log every failed attempt.
    #[builder(default = false)]
    pub debug: bool,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default = DEFAULT_REPORT_INTERVAL)]
    pub report_interval: Duration,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runtime.is_zero() {
            return Err(Error::Config("runtime must be greater than zero".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        if self.report_interval.is_zero() {
            return Err(Error::Config(
                "report interval must be greater than zero".into(),
            ));
        }
        self.retry.validate()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
