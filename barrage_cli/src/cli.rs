use std::{path::PathBuf, time::Duration};

use barrage::{HttpConfig, RequestTemplate, RetryPolicy, RunConfig};
use clap::{Parser, ValueEnum};
use reqwest::Method;

/// Keep a pool of workers per URL busy for a fixed time and report how many
/// requests succeeded.
#[derive(Parser, Debug)]
#[command(name = "barrage", version, about)]
pub struct Cli {
    /// How long to run
    #[arg(short, long, env = "BARRAGE_RUNTIME", default_value = "1h", value_parser = humantime::parse_duration)]
    pub runtime: Duration,

    /// Workers per URL
    #[arg(short, long, env = "BARRAGE_PARALLELISM", default_value_t = 1000)]
    pub parallelism: usize,

    /// Connection and request timeout
    #[arg(short, long, env = "BARRAGE_TIMEOUT", default_value = "90s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// File with one URL per line
    #[arg(short, long, env = "BARRAGE_URLS", default_value = "urls")]
    pub urls: PathBuf,

    /// Log every failed request on stderr
    #[arg(short, long, env = "BARRAGE_DEBUG")]
    pub debug: bool,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long, env = "BARRAGE_INSECURE")]
    pub insecure: bool,

    /// HTTP method
    #[arg(short = 'X', long, env = "BARRAGE_METHOD", default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Extra header, `Name: value`; may be repeated
    #[arg(short = 'H', long = "header", env = "BARRAGE_HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// What a worker does after a failed request
    #[arg(long, env = "BARRAGE_RETRY", value_enum, default_value_t = RetryKind::Immediate)]
    pub retry: RetryKind,

    /// First wait of the backoff retry policy
    #[arg(long, env = "BARRAGE_BACKOFF_INITIAL", default_value = "100ms", value_parser = humantime::parse_duration)]
    pub backoff_initial: Duration,

    /// Longest wait of the backoff retry policy
    #[arg(long, env = "BARRAGE_BACKOFF_MAX", default_value = "5s", value_parser = humantime::parse_duration)]
    pub backoff_max: Duration,

    /// Consecutive failures after which a worker of the capped retry policy stops
    #[arg(long, env = "BARRAGE_MAX_FAILURES", default_value_t = 100)]
    pub max_failures: u32,

    /// Time between two live reports
    #[arg(long, env = "BARRAGE_REPORT_INTERVAL", default_value = "2s", value_parser = humantime::parse_duration)]
    pub report_interval: Duration,

    /// Idle connections kept per host [default: parallelism]
    #[arg(long, env = "BARRAGE_MAX_IDLE_PER_HOST")]
    pub max_idle_per_host: Option<usize>,

    /// Print the final summary as JSON
    #[arg(long, env = "BARRAGE_JSON")]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryKind {
    Immediate,
    Backoff,
    Capped,
}

impl Cli {
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retry {
            RetryKind::Immediate => RetryPolicy::Immediate,
            RetryKind::Backoff => RetryPolicy::Backoff {
                initial: self.backoff_initial,
                max: self.backoff_max,
            },
            RetryKind::Capped => RetryPolicy::Capped {
                max_consecutive_failures: self.max_failures,
            },
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::builder()
            .runtime(self.runtime)
            .parallelism(self.parallelism)
            .timeout(self.timeout)
            .debug(self.debug)
            .retry(self.retry_policy())
            .report_interval(self.report_interval)
            .build()
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::builder()
            .pool_max_idle_per_host(self.max_idle_per_host.unwrap_or(self.parallelism))
            .insecure(self.insecure)
            .build()
            .with_timeout(self.timeout)
    }

    pub fn template(&self) -> barrage::Result<RequestTemplate> {
        self.headers.iter().try_fold(
            RequestTemplate::browser().with_method(self.method.clone()),
            |template, (name, value)| template.with_header(name, value),
        )
    }
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method '{s}'"))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{s}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
