//! Test transport: records every request, answers from a script and counts
//! open/close of the resources it hands out.

#![allow(dead_code)]

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use courier::prelude::*;
use courier::types::ResponseBody;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

/// What the fake transport answers with.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Buffered response.
    Body(StatusCode, Bytes),
    /// Never completes; holds an open handle until the send is dropped.
    Hang,
    /// Returns the headers immediately, yields `first` and then stalls
    /// forever; the body stream holds an open handle.
    StallingBody(Bytes),
}

/// Counts open/close pairs.
#[derive(Clone, Debug, Default)]
pub struct Handles {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Handles {
    fn open(&self) -> OpenHandle {
        self.opened.fetch_add(1, Ordering::SeqCst);
        OpenHandle {
            closed: self.closed.clone(),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct OpenHandle {
    closed: Arc<AtomicUsize>,
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct GuardedStream {
    inner: BoxStream<'static, courier::Result<Bytes>>,
    _handle: OpenHandle,
}

impl Stream for GuardedStream {
    type Item = courier::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

pub struct FakeTransport {
    reply: Reply,
    sends: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
    log: Option<Arc<Mutex<Vec<String>>>>,
    pub handles: Handles,
}

impl FakeTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            sends: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            log: None,
            handles: Handles::default(),
        }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: &'static str) -> Self {
        Self::new(Reply::Body(StatusCode::OK, Bytes::from_static(body.as_bytes())))
    }

    /// Push `"send"` into `log` on every send.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// The most recent request that reached the transport.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(
        &self,
        request: HttpRequest,
        _cancel: &CancellationToken,
    ) -> courier::Result<HttpResponse> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push("send".to_string());
        }
        self.requests.lock().unwrap().push(request);

        match &self.reply {
            Reply::Body(status, body) => Ok(HttpResponse::from_bytes(*status, body.clone())),
            Reply::Hang => {
                let _handle = self.handles.open();
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
            Reply::StallingBody(first) => {
                let first = first.clone();
                let inner: BoxStream<'static, courier::Result<Bytes>> =
                    stream::once(async move { Ok(first) })
                    .chain(stream::pending())
                    .boxed();
                let body = GuardedStream {
                    inner,
                    _handle: self.handles.open(),
                };
                Ok(HttpResponse::new(
                    StatusCode::OK,
                    HeaderMap::new(),
                    ResponseBody::Stream(body.boxed()),
                ))
            }
        }
    }
}
