//! HTTP interceptor chain
//!
//! Interceptors wrap the transport in registration order: the first one
//! registered on a client is the outermost and runs first. Each interceptor
//! receives a [`Next`] cursor and forwards the (possibly edited) request by
//! calling [`Next::run`]; the cursor past the last interceptor performs the
//! single transport send.
//!
//! The common case is a synchronous callback run just before the request
//! leaves the process ([`BeforeSendInterceptor`]). Callbacks come in two
//! shapes, with and without a [`ResolutionContext`]; [`without_context`] adapts
//! the second into the first.
//!
//! No timeout is applied to callbacks. A callback that blocks holds the request
//! until it returns, so callbacks must do bounded work and should check the
//! cancellation token before anything slow.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{CourierError, Result};
use crate::resolver::{ContextSource, ResolutionContext};
use crate::transport::HttpTransport;
use crate::types::{HttpRequest, HttpResponse};

/// Callback invoked before a request is sent.
pub type BeforeSendCallback = Arc<
    dyn Fn(Option<&ResolutionContext>, &mut HttpRequest, &CancellationToken) -> Result<()>
        + Send
        + Sync,
>;

/// A stage of a client's request pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs and in [`CourierError::InterceptorFailure`].
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle `request`, normally by forwarding it with `next.run(..)`.
    ///
    /// Returning an error without calling `next` aborts the request: no later
    /// interceptor runs and nothing is sent.
    async fn handle(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<HttpResponse>;
}

/// Cursor over the rest of an interceptor chain.
///
/// [`run`](Next::run) consumes the cursor, so an interceptor can forward a
/// request at most once.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn HttpTransport,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Interceptor>], transport: &'a dyn HttpTransport) -> Self {
        Self { chain, transport }
    }

    /// Number of interceptors still to run before the transport.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Run the next interceptor, or send the request if none are left.
    pub async fn run(self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        match self.chain.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    chain: rest,
                    transport: self.transport,
                };
                current.handle(request, cancel, next).await
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CourierError::Cancelled),
                    result = self.transport.send(request, cancel) => result,
                }
            }
        }
    }
}

static_assertions::assert_not_impl_any!(Next<'static>: Clone, Copy);

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .finish()
    }
}

/// Box a closure as a [`BeforeSendCallback`].
pub fn before_send<F>(callback: F) -> BeforeSendCallback
where
    F: Fn(Option<&ResolutionContext>, &mut HttpRequest, &CancellationToken) -> Result<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(callback)
}

/// Adapt a context-less callback to [`BeforeSendCallback`]. The context
/// argument is ignored.
pub fn without_context<F>(callback: F) -> BeforeSendCallback
where
    F: Fn(&mut HttpRequest, &CancellationToken) -> Result<()> + Send + Sync + 'static,
{
    before_send(move |_ctx, request, cancel| callback(request, cancel))
}

/// Interceptor that runs a callback before forwarding the request.
pub struct BeforeSendInterceptor {
    name: String,
    callback: BeforeSendCallback,
    context: Option<ContextSource>,
}

impl BeforeSendInterceptor {
    /// `context` is the lookup used to build the callback's context argument;
    /// with `None` the callback always receives `None` and no lookup happens.
    pub fn new(
        name: impl Into<String>,
        callback: BeforeSendCallback,
        context: Option<ContextSource>,
    ) -> Self {
        Self {
            name: name.into(),
            callback,
            context,
        }
    }
}

#[async_trait]
impl Interceptor for BeforeSendInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        // Resolved once per call, and only for context-aware callbacks.
        let context = self.context.as_ref().map(|source| source.resolve(&request));
        tracing::trace!(
            target: "courier::http",
            interceptor = %self.name,
            url = %request.url(),
            scoped = context.as_ref().is_some_and(ResolutionContext::is_request_scoped),
            "before-send callback"
        );
        if let Err(err) = (self.callback)(context.as_ref(), &mut request, cancel) {
            tracing::debug!(target: "courier::http", interceptor = %self.name, err = %err, "before-send callback failed");
            return Err(err);
        }
        next.run(request, cancel).await
    }
}

impl std::fmt::Debug for BeforeSendInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeforeSendInterceptor")
            .field("name", &self.name)
            .field("with_context", &self.context.is_some())
            .finish()
    }
}

/// A simple logging interceptor backed by `tracing` (no headers or bodies).
#[derive(Clone, Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();
        tracing::debug!(target: "courier::http", %method, %url, "sending request");

        let result = next.run(request, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => {
                tracing::debug!(target: "courier::http", %method, %url, status = response.status().as_u16(), elapsed_ms, "response received");
            }
            Err(err) => {
                tracing::debug!(target: "courier::http", %method, %url, err = %err, elapsed_ms, "request error");
            }
        }
        result
    }
}
