//! The seam between workers and the network.
//!
//! Workers only know that an attempt against a [`Target`] either completed or
//! failed. [`HttpTransport`] is the real implementation; tests plug in fakes
//! with scripted outcomes.

use std::{future::Future, sync::Arc, time::Duration};

use reqwest::Client;
use thiserror::Error;

use crate::{config::HttpConfig, error::Result, target::Target, template::RequestTemplate};

/// Why a single attempt failed. Never fatal, only counted.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connecting, TLS, sending, or timing out before a response arrived.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// A response arrived but its body could not be read to the end.
    #[error("response body unusable: {0}")]
    Body(#[source] reqwest::Error),

    /// The attempt did not finish within the run's attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Failure reported by a non-HTTP transport.
    #[error("{0}")]
    Other(String),
}

/// Carries out one attempt against a target.
///
/// Implementations must bound each attempt in time: shutdown latency of a
/// worker is the duration of the attempt it is in when the signal fires.
pub trait Transport: Send + Sync + 'static {
    fn attempt(
        &self,
        target: &Target,
    ) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;
}

/// Sends the template through one shared, pooled `reqwest` client.
///
/// Any response whose body can be read to the end counts as a success,
/// whatever its status code.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    template: Arc<RequestTemplate>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, template: RequestTemplate) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self::with_client(client, template, config.request_timeout))
    }

    pub fn with_client(client: Client, template: RequestTemplate, timeout: Duration) -> Self {
        Self {
            client,
            template: Arc::new(template),
            timeout,
        }
    }
}

impl Transport for HttpTransport {
    async fn attempt(&self, target: &Target) -> std::result::Result<(), TransportError> {
        let mut response = self
            .template
            .request(&self.client, target, self.timeout)
            .send()
            .await
            .map_err(TransportError::Request)?;

        // Reading to the end hands the connection back to the pool instead of
        // tearing it down.
        while response
            .chunk()
            .await
            .map_err(TransportError::Body)?
            .is_some()
        {}
        Ok(())
    }
}

/// Build the shared client from the pool and timeout tunables.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout);

    if let Some(keepalive) = config.tcp_keepalive {
        builder = builder.tcp_keepalive(keepalive);
    }

    if config.insecure {
        tracing::warn!("TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}
