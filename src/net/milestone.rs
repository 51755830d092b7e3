//! Socket wrapper reporting write/read milestones of the current exchange.
//!
//! # Responsibilities
//! - Report header-write-done on the first write of an exchange
//! - Report request-write-done on the first flush after writing
//! - Report first-response-byte on the first non-empty read
//!
//! # Design Decisions
//! - The wrapper lives with the connection; the slot is re-armed for each
//!   exchange that checks the connection out of the pool
//! - An unarmed wrapper is a plain pass-through

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::observability::events::{ExchangeTrace, TracePhase};

#[derive(Debug)]
struct Milestones {
    trace: ExchangeTrace,
    wrote_headers: bool,
    wrote_request: bool,
    first_byte: bool,
}

/// Shared handle naming the exchange currently using a connection.
#[derive(Debug, Clone, Default)]
pub struct MilestoneSlot {
    current: Arc<Mutex<Option<Milestones>>>,
}

impl MilestoneSlot {
    /// Attach the next exchange, or detach when `None`.
    pub fn arm(&self, trace: Option<ExchangeTrace>) {
        if let Ok(mut current) = self.current.lock() {
            *current = trace.map(|trace| Milestones {
                trace,
                wrote_headers: false,
                wrote_request: false,
                first_byte: false,
            });
        }
    }

    fn on_write(&self) {
        self.with(|m| {
            if !m.wrote_headers {
                m.wrote_headers = true;
                m.trace.emit(TracePhase::WroteHeaders);
            }
        });
    }

    fn on_flush(&self) {
        self.with(|m| {
            if m.wrote_headers && !m.wrote_request {
                m.wrote_request = true;
                m.trace.emit(TracePhase::WroteRequest);
            }
        });
    }

    fn on_read(&self) {
        self.with(|m| {
            if !m.first_byte {
                m.first_byte = true;
                m.trace.emit(TracePhase::FirstResponseByte);
            }
        });
    }

    fn with(&self, f: impl FnOnce(&mut Milestones)) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(milestones) = current.as_mut() {
                f(milestones);
            }
        }
    }
}

/// IO wrapper feeding a [`MilestoneSlot`].
#[derive(Debug)]
pub struct MilestoneIo<T> {
    inner: T,
    slot: MilestoneSlot,
}

impl<T> MilestoneIo<T> {
    pub fn new(inner: T, slot: MilestoneSlot) -> Self {
        Self { inner, slot }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for MilestoneIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if buf.filled().len() > before {
            this.slot.on_read();
        }
        Poll::Ready(Ok(()))
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for MilestoneIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        if written > 0 {
            this.slot.on_write();
        }
        Poll::Ready(Ok(written))
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let written = ready!(Pin::new(&mut this.inner).poll_write_vectored(cx, bufs))?;
        if written > 0 {
            this.slot.on_write();
        }
        Poll::Ready(Ok(written))
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.inner).poll_flush(cx))?;
        this.slot.on_flush();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
