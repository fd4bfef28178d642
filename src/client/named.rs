//! Built, immutable named client

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use crate::error::{CourierError, Result};
use crate::interceptor::{Interceptor, Next};
use crate::transport::HttpTransport;
use crate::types::{HttpRequest, HttpResponse};

struct ClientInner {
    name: String,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport: Arc<dyn HttpTransport>,
}

/// A configured client obtained from
/// [`ClientFactory::client`](super::ClientFactory::client).
///
/// Cheap to clone and safe to share across tasks; its configuration never
/// changes after build.
#[derive(Clone)]
pub struct NamedClient {
    inner: Arc<ClientInner>,
}

static_assertions::assert_impl_all!(NamedClient: Send, Sync, Clone);

impl NamedClient {
    pub(crate) fn new(
        name: String,
        base_url: Option<Url>,
        default_headers: HeaderMap,
        timeout: Option<Duration>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                name,
                base_url,
                default_headers,
                timeout,
                interceptors,
                transport,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    /// Interceptor names in execution order.
    pub fn interceptor_names(&self) -> Vec<&str> {
        self.inner.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Resolve `target` against the base address.
    ///
    /// Absolute targets are used as given. Relative targets are joined with
    /// RFC 3986 rules, so `users` against `https://host/v1/` gives
    /// `https://host/v1/users` but against `https://host/v1` gives
    /// `https://host/users`.
    pub fn resolve_url(&self, target: &str) -> Result<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url().ok_or_else(|| {
                    CourierError::invalid_argument(format!(
                        "Client '{}' has no base address; cannot resolve '{target}'",
                        self.name()
                    ))
                })?;
                base.join(target).map_err(|e| {
                    CourierError::invalid_argument(format!("Invalid target '{target}': {e}"))
                })
            }
            Err(e) => Err(CourierError::invalid_argument(format!(
                "Invalid target '{target}': {e}"
            ))),
        }
    }

    /// Build a request for `target`. Nothing is sent.
    pub fn request(&self, method: Method, target: &str) -> Result<HttpRequest> {
        Ok(HttpRequest::new(method, self.resolve_url(target)?))
    }

    /// Send `request` through the interceptor chain and the transport.
    pub async fn send(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let inner = &self.inner;
        for (name, value) in &inner.default_headers {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
        if request.timeout().is_none() {
            request.set_timeout(inner.timeout);
        }

        let span = tracing::debug_span!(
            target: "courier::http",
            "courier.send",
            client = %inner.name,
            method = %request.method(),
            interceptors = inner.interceptors.len(),
        );
        Next::new(&inner.interceptors, inner.transport.as_ref())
            .run(request, cancel)
            .instrument(span)
            .await
    }

    pub async fn get(&self, target: &str, cancel: &CancellationToken) -> Result<HttpResponse> {
        self.send(self.request(Method::GET, target)?, cancel).await
    }

    pub async fn delete(&self, target: &str, cancel: &CancellationToken) -> Result<HttpResponse> {
        self.send(self.request(Method::DELETE, target)?, cancel).await
    }
}

impl std::fmt::Debug for NamedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedClient")
            .field("name", &self.inner.name)
            .field("base_url", &self.base_url().map(Url::as_str))
            .field("interceptors", &self.interceptor_names())
            .finish()
    }
}
