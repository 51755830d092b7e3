//! Bounded body capture.
//!
//! # Responsibilities
//! - Keep at most `budget` bytes of a body for diagnostics
//! - Count every byte that passes, captured or not
//! - Wrap streaming response bodies without buffering them
//!
//! # Design Decisions
//! - Frames pass through untouched; capture only copies the prefix
//! - The final body event fires once, at end of stream or on drop

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::observability::events::{BodySnapshot, ExchangeTrace, TracePhase};

/// Default number of body bytes retained per exchange.
pub const DEFAULT_CAPTURE_BUDGET: usize = 64 * 1024;

/// Capture buffer that never grows past its budget.
#[derive(Debug, Clone)]
pub struct PreviewBuffer {
    budget: usize,
    captured: Vec<u8>,
    seen: u64,
    truncated: bool,
}

impl PreviewBuffer {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            captured: Vec::new(),
            seen: 0,
            truncated: false,
        }
    }

    /// Capture a body that is already fully buffered.
    pub fn of_complete(body: &[u8], budget: usize) -> Self {
        let mut buffer = Self::new(budget);
        buffer.record(body);
        buffer
    }

    /// Account for the next chunk, keeping what still fits.
    pub fn record(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.seen += chunk.len() as u64;

        let remaining = self.budget - self.captured.len();
        if chunk.len() > remaining {
            self.captured.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        } else {
            self.captured.extend_from_slice(chunk);
        }
    }

    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            size: self.seen,
            truncated: self.truncated,
            preview: Bytes::copy_from_slice(&self.captured),
        }
    }
}

/// Response body wrapper that captures a bounded prefix as it is read.
#[derive(Debug)]
pub struct CapturedBody<B> {
    inner: B,
    preview: PreviewBuffer,
    trace: Option<ExchangeTrace>,
}

impl<B> CapturedBody<B> {
    pub fn new(inner: B, budget: usize, trace: ExchangeTrace) -> Self {
        Self {
            inner,
            preview: PreviewBuffer::new(budget),
            trace: Some(trace),
        }
    }

    /// Capture state so far.
    pub fn preview(&self) -> &PreviewBuffer {
        &self.preview
    }

    /// Emit the body event. Later calls do nothing.
    fn finish(&mut self) {
        if let Some(trace) = self.trace.take() {
            trace.emit(TracePhase::ResponseBody {
                body: self.preview.snapshot(),
            });
        }
    }
}

impl<B> Body for CapturedBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.preview.record(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for CapturedBody<B> {
    fn drop(&mut self) {
        self.finish();
    }
}
