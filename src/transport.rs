//! HTTP transport
//!
//! The transport is the last stage of every interceptor chain. The default
//! implementation is [`ReqwestTransport`]; tests and embedders may inject any
//! other [`HttpTransport`] to observe the final request or return a synthetic
//! response without touching the network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CourierError, Result};
use crate::types::{HttpRequest, HttpResponse, ResponseBody};

/// Default user agent sent by [`ReqwestTransport`].
pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Sends a fully prepared request.
///
/// The cancellation token is the one governing the whole call. The interceptor
/// chain already races `send` against it, so implementations only need to
/// observe it if they hold resources that outlive the future.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse>;
}

/// Settings for the shared `reqwest::Client` behind [`ReqwestTransport`].
///
/// Timeouts are whole seconds in configuration files. Per-client timeouts set
/// with `ClientBuilder::request_timeout` take precedence over `timeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
    /// Headers sent by every client sharing the transport.
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            headers: HashMap::new(),
            proxy: None,
            user_agent: Some(USER_AGENT.to_string()),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

/// Parse configured `name -> value` pairs into a [`HeaderMap`].
pub(crate) fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    headers
        .iter()
        .map(|(name, value)| -> Result<(HeaderName, HeaderValue)> {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                CourierError::Configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                CourierError::Configuration(format!("Invalid value for header '{name}': {e}"))
            })?;
            Ok((header, value))
        })
        .collect()
}

/// Build the `reqwest::Client` described by `config`.
///
/// ```rust
/// use courier::transport::{HttpConfig, build_http_client};
///
/// let client = build_http_client(&HttpConfig::default())?;
/// # Ok::<(), courier::CourierError>(())
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().default_headers(header_map(&config.headers)?);
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(proxy) = &config.proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| CourierError::Configuration(format!("Invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder
        .build()
        .map_err(|e| CourierError::Configuration(format!("Cannot build HTTP client: {e}")))
}

/// [`HttpTransport`] over `reqwest`. The response body is exposed as a
/// stream; nothing is buffered here.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest, _cancel: &CancellationToken) -> Result<HttpResponse> {
        let (method, url, headers, body, timeout) = request.into_parts();
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(CourierError::from).boxed();
        Ok(HttpResponse::new(status, headers, ResponseBody::Stream(body)))
    }
}
