//! Per-client setup builder

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::named::NamedClient;
use crate::error::{CourierError, Result};
use crate::interceptor::{
    BeforeSendInterceptor, Interceptor, LoggingInterceptor, before_send, without_context,
};
use crate::resolver::{ContextSource, ResolutionContext, ServiceRegistry};
use crate::transport::HttpTransport;
use crate::types::HttpRequest;

/// Produces an interceptor once, when the owning client is built.
pub type InterceptorFactory =
    Arc<dyn Fn(&Arc<ServiceRegistry>) -> Arc<dyn Interceptor> + Send + Sync>;

/// Parse a base address. It must be an absolute `http`/`https` URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        CourierError::invalid_argument(format!("Invalid base address '{raw}': {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(CourierError::invalid_argument(format!(
            "Invalid base address '{raw}': expected an absolute http(s) URL"
        )));
    }
    Ok(url)
}

/// Mutable configuration of one named client.
///
/// Only reachable during setup through
/// [`ClientRegistry`](super::ClientRegistry); it is frozen into a
/// [`NamedClient`] by [`ClientRegistry::build`](super::ClientRegistry::build).
pub struct ClientBuilder {
    name: String,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    interceptors: Vec<InterceptorFactory>,
}

impl ClientBuilder {
    pub(crate) fn new(name: impl Into<String>, base_url: Option<Url>) -> Self {
        Self {
            name: name.into(),
            base_url,
            default_headers: HeaderMap::new(),
            timeout: None,
            interceptors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Replace the base address. Fails with `InvalidArgument` if `raw` is not
    /// an absolute http(s) URL.
    pub fn set_base_url(&mut self, raw: &str) -> Result<&mut Self> {
        self.base_url = Some(parse_base_url(raw)?);
        Ok(self)
    }

    /// Header added to every request of this client unless the request
    /// already carries one with the same name.
    pub fn default_header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CourierError::invalid_argument(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            CourierError::invalid_argument(format!("Invalid header value for '{name}': {e}"))
        })?;
        self.default_headers.insert(header, value);
        Ok(self)
    }

    /// Timeout applied to requests that do not set their own.
    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append an interceptor. `factory` runs once at build time with the
    /// process-wide registry.
    pub fn add_interceptor<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&Arc<ServiceRegistry>) -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        self.interceptors.push(Arc::new(factory));
        self
    }

    /// Run `callback` before every request of this client. The callback gets
    /// no resolution context.
    pub fn for_each_request<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut HttpRequest, &CancellationToken) -> Result<()> + Send + Sync + 'static,
    {
        let name = self.next_callback_name();
        let callback = without_context(callback);
        self.add_interceptor(move |_services| {
            Arc::new(BeforeSendInterceptor::new(name.clone(), callback.clone(), None))
        })
    }

    /// Run `callback` before every request of this client, with the
    /// resolution context current for that request.
    pub fn for_each_request_with_context<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&ResolutionContext, &mut HttpRequest, &CancellationToken) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        let name = self.next_callback_name();
        let callback = before_send(move |ctx, request, cancel| match ctx {
            Some(ctx) => callback(ctx, request, cancel),
            None => Err(CourierError::interceptor(
                "before_send",
                "resolution context unavailable",
            )),
        });
        self.add_interceptor(move |services| {
            Arc::new(BeforeSendInterceptor::new(
                name.clone(),
                callback.clone(),
                Some(ContextSource::new(services.clone())),
            ))
        })
    }

    /// Append a [`LoggingInterceptor`].
    pub fn with_logging(&mut self) -> &mut Self {
        self.add_interceptor(|_services| Arc::new(LoggingInterceptor))
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    fn next_callback_name(&self) -> String {
        format!("{}.before_send[{}]", self.name, self.interceptors.len())
    }

    pub(crate) fn build(
        &self,
        services: &Arc<ServiceRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> NamedClient {
        let interceptors = self
            .interceptors
            .iter()
            .map(|factory| factory(services))
            .collect();
        NamedClient::new(
            self.name.clone(),
            self.base_url.clone(),
            self.default_headers.clone(),
            self.timeout,
            interceptors,
            transport,
        )
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("default_headers", &self.default_headers.len())
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_base_url_accepts_http_and_https() {
        assert_eq!(
            parse_base_url("https://api.example.test/v1/").unwrap().as_str(),
            "https://api.example.test/v1/"
        );
        assert!(parse_base_url("http://localhost:8080").is_ok());
    }

    #[test]
    fn parse_base_url_rejects_relative_and_non_http() {
        for raw in ["not a uri", "/relative/path", "mailto:someone@example.test", "ftp://files.test/"] {
            let err = parse_base_url(raw).unwrap_err();
            assert!(matches!(err, CourierError::InvalidArgument(_)), "{raw}");
        }
    }

    #[test]
    fn callbacks_get_positional_names() {
        let mut builder = ClientBuilder::new("billing", None);
        builder
            .for_each_request(|_req, _cancel| Ok(()))
            .for_each_request(|_req, _cancel| Ok(()));
        assert_eq!(builder.interceptor_count(), 2);
        assert_eq!(builder.next_callback_name(), "billing.before_send[2]");
    }

    #[test]
    fn default_header_rejects_invalid_name() {
        let mut builder = ClientBuilder::new("billing", None);
        let err = builder.default_header("bad header", "x").unwrap_err();
        assert!(matches!(err, CourierError::InvalidArgument(_)));
    }
}
