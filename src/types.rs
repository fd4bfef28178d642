//! Request and response types
//!
//! [`HttpRequest`] is the mutable request that travels through the
//! interceptor chain; [`HttpResponse`] is what the transport hands back.
//! Both are created per call and owned by the caller.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use tokio_util::sync::CancellationToken;

use crate::error::{CourierError, Result};
use crate::resolver::RequestScope;

/// Content type attached to JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Methods accepted by the JSON body helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonMethod {
    Post,
    Put,
    Patch,
}

impl JsonMethod {
    /// The matching HTTP method.
    pub fn as_method(self) -> Method {
        match self {
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
        }
    }
}

impl From<JsonMethod> for Method {
    fn from(method: JsonMethod) -> Self {
        method.as_method()
    }
}

/// An outgoing HTTP request.
///
/// Interceptors receive `&mut HttpRequest` and may edit headers, the body or
/// the target URL in place.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    scope: Option<RequestScope>,
}

impl HttpRequest {
    /// Request with no headers, body, timeout or scope.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            scope: None,
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute target URL, already resolved against the client's base.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable target URL, e.g. to append query pairs.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request body, if one was set.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Attach a body and set its `Content-Type`.
    pub fn set_body(&mut self, body: impl Into<Bytes>, content_type: &str) -> Result<()> {
        let value = HeaderValue::from_str(content_type).map_err(|e| {
            CourierError::invalid_argument(format!("Invalid content type '{content_type}': {e}"))
        })?;
        self.headers.insert(CONTENT_TYPE, value);
        self.body = Some(body.into());
        Ok(())
    }

    /// Per-request timeout handed to the transport.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Override the per-request timeout. `None` leaves the transport default.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Request scope explicitly attached by the caller. Takes precedence over
    /// any ambient scope when interceptors resolve their context.
    pub fn scope(&self) -> Option<&RequestScope> {
        self.scope.as_ref()
    }

    /// Attach an explicit request scope.
    pub fn with_scope(mut self, scope: RequestScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Split into the parts a transport needs. The scope is dropped here: it
    /// never leaves the process.
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Bytes>, Option<Duration>) {
        (self.method, self.url, self.headers, self.body, self.timeout)
    }
}

/// Body of an [`HttpResponse`].
pub enum ResponseBody {
    /// Fully buffered body.
    Bytes(Bytes),
    /// Body still arriving from the transport.
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A response returned by the transport.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl HttpResponse {
    /// Response with the given status, headers and body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Buffered response with no headers.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::Bytes(body.into()))
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume the response and return its body as a byte stream.
    pub fn into_body_stream(self) -> BoxStream<'static, Result<Bytes>> {
        match self.body {
            ResponseBody::Bytes(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            ResponseBody::Stream(stream) => stream,
        }
    }

    /// Read the whole body. The stream is dropped on every exit path,
    /// including cancellation.
    pub async fn bytes(self, cancel: &CancellationToken) -> Result<Bytes> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let mut body = self.into_body_stream();
        let mut buf = BytesMut::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CourierError::Cancelled),
                chunk = body.next() => match chunk {
                    Some(chunk) => buf.extend_from_slice(&chunk?),
                    None => break,
                },
            }
        }
        Ok(buf.freeze())
    }

    /// Read the whole body as UTF-8 text (lossy).
    pub async fn text(self, cancel: &CancellationToken) -> Result<String> {
        let bytes = self.bytes(cancel).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
