//! Observed transport: a tower layer that traces every exchange.
//!
//! # Responsibilities
//! - Number exchanges and redact headers before anything is logged
//! - Buffer request bodies once so they can be both captured and sent
//! - Hand the exchanger a trace handle for connection phases
//! - Capture a bounded prefix of the streaming response body
//!
//! # Design Decisions
//! - Errors from the wrapped exchanger come back unchanged
//! - Capture is best-effort; it never alters success or failure
//! - An exchange dropped before the exchanger answers (timeout, cancellation)
//!   still ends with a `http response error` event
//! - One id counter per layer instance; clones of the service share it

use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::BoxFuture;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tower::{Layer, Service, ServiceExt};

use crate::net::error::{BoxError, TransportError};
use crate::observability::capture::{CapturedBody, PreviewBuffer, DEFAULT_CAPTURE_BUDGET};
use crate::observability::events::{ExchangeIds, ExchangeTrace, TracePhase, TraceSink, TracingSink};
use crate::security::headers::redact_headers;
use crate::xsd::XsdDateTime;

struct Shared {
    budget: usize,
    sink: Arc<dyn TraceSink>,
    ids: ExchangeIds,
}

/// Layer producing [`Observed`] services.
#[derive(Clone)]
pub struct ObservedLayer {
    shared: Arc<Shared>,
}

impl ObservedLayer {
    /// Trace to `tracing` with the default capture budget.
    pub fn new() -> Self {
        Self::with_sink(DEFAULT_CAPTURE_BUDGET, Arc::new(TracingSink))
    }

    pub fn with_sink(budget: usize, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                budget,
                sink,
                ids: ExchangeIds::new(),
            }),
        }
    }

    pub fn budget(&self) -> usize {
        self.shared.budget
    }
}

impl Default for ObservedLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for ObservedLayer {
    type Service = Observed<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Observed {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// An exchanger wrapped with capture, redaction and phase tracing.
#[derive(Clone)]
pub struct Observed<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, B, RB> Service<Request<B>> for Observed<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<RB>, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    RB: Body<Data = Bytes> + Unpin + Send + 'static,
{
    type Response = Response<CapturedBody<RB>>;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // The readied service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let shared = Arc::clone(&self.shared);
        Box::pin(observe(inner, shared, request))
    }
}

async fn observe<S, B, RB>(
    inner: S,
    shared: Arc<Shared>,
    request: Request<B>,
) -> Result<Response<CapturedBody<RB>>, TransportError>
where
    S: Service<Request<Full<Bytes>>, Response = Response<RB>, Error = TransportError>,
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
    RB: Body<Data = Bytes> + Unpin,
{
    let trace = ExchangeTrace::new(shared.ids.next(), Arc::clone(&shared.sink));
    let (mut parts, body) = request.into_parts();

    let body = body
        .collect()
        .await
        .map_err(|e| TransportError::Body(e.into()))?
        .to_bytes();

    trace.emit(TracePhase::Request {
        method: parts.method.to_string(),
        target: parts.uri.to_string(),
        headers: redact_headers(&parts.headers),
        content_length: declared_length(&parts.headers).or(Some(body.len() as u64)),
        body: PreviewBuffer::of_complete(&body, shared.budget).snapshot(),
        started_at: XsdDateTime::from(Utc::now()).format(),
    });

    parts.extensions.insert(trace.clone());
    let request = Request::from_parts(parts, Full::new(body));

    let in_flight = InFlight(Some(trace.clone()));
    let outcome = inner.oneshot(request).await;
    in_flight.settle();

    match outcome {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            trace.emit(TracePhase::Response {
                status: parts.status.as_u16(),
                headers: redact_headers(&parts.headers),
                content_length: declared_length(&parts.headers),
            });
            Ok(Response::from_parts(
                parts,
                CapturedBody::new(body, shared.budget, trace),
            ))
        }
        Err(err) => {
            trace.emit(TracePhase::ResponseError {
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

/// Reports an exchange abandoned while the exchanger was still working.
struct InFlight(Option<ExchangeTrace>);

impl InFlight {
    fn settle(mut self) {
        self.0 = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(trace) = self.0.take() {
            trace.emit(TracePhase::ResponseError {
                error: ABANDONED.to_string(),
            });
        }
    }
}

/// Error text of an exchange dropped before it completed.
pub const ABANDONED: &str = "exchange cancelled before a response arrived";

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
