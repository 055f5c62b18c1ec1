use std::time::Duration;

use reqwest::{
    Client, Method, RequestBuilder,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use crate::{
    error::{Error, Result},
    target::Target,
};

/// Headers a desktop Chrome sends on a top-level navigation.
///
/// Servers that treat unknown clients differently see the same traffic a
/// browser would produce.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("connection", "keep-alive"),
    ("cache-control", "max-age=0"),
    (
        "sec-ch-ua",
        r#"" Not A;Brand";v="99", "Chromium";v="98", "Google Chrome";v="98""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Linux""#),
    ("upgrade-insecure-requests", "1"),
    (
        "user-agent",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36",
    ),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9",
    ),
    ("sec-fetch-site", "none"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-user", "?1"),
    ("sec-fetch-dest", "document"),
    ("accept-language", "en-US,en;q=0.9,ru;q=0.8,uk;q=0.7"),
];

/// Immutable baseline request: a method and a header set.
///
/// One template is shared read-only by every worker. Each attempt derives its
/// own request from it with [`RequestTemplate::request`], so nothing derived
/// from the template can leak back into it.
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    method: Method,
    headers: HeaderMap,
}

impl RequestTemplate {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
        }
    }

    /// A `GET` template carrying [`BROWSER_HEADERS`].
    pub fn browser() -> Self {
        let mut headers = HeaderMap::with_capacity(BROWSER_HEADERS.len());
        for (name, value) in BROWSER_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        Self {
            method: Method::GET,
            headers,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set (or replace) a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Derive the request for one attempt against `target`.
    ///
    /// `timeout` bounds the whole attempt, from connecting to the last body
    /// byte, and is bound anew on every call.
    pub fn request(&self, client: &Client, target: &Target, timeout: Duration) -> RequestBuilder {
        client
            .request(self.method.clone(), target.url().clone())
            .headers(self.headers.clone())
            .timeout(timeout)
    }
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self::browser()
    }
}
