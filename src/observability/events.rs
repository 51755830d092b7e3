//! Trace events produced for every observed exchange.
//!
//! # Responsibilities
//! - Allocate exchange ids (atomic, per transport instance)
//! - Define the per-phase event records
//! - Deliver events to a pluggable sink (`tracing` by default)

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Header name/value pairs after redaction, in wire order.
pub type HeaderList = Vec<(String, String)>;

/// Identifier of one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic exchange id source.
///
/// Relaxed ordering is enough: ids only need to be unique and increasing.
#[derive(Debug, Default)]
pub struct ExchangeIds {
    last: AtomicU64,
}

impl ExchangeIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id. The first id is 1.
    pub fn next(&self) -> ExchangeId {
        ExchangeId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Bounded view of a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodySnapshot {
    /// Total bytes seen, captured or not.
    pub size: u64,
    /// True once the body outgrew the capture budget.
    pub truncated: bool,
    /// Captured prefix, byte for byte.
    pub preview: Bytes,
}

impl BodySnapshot {
    /// The preview as text; invalid UTF-8 is replaced for display only.
    pub fn preview_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.preview)
    }
}

/// What happened at one point of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum TracePhase {
    Request {
        method: String,
        target: String,
        headers: HeaderList,
        content_length: Option<u64>,
        body: BodySnapshot,
        started_at: Option<String>,
    },
    DnsStart {
        host: String,
    },
    DnsDone {
        addrs: Vec<String>,
        error: Option<String>,
    },
    ConnectStart {
        network: &'static str,
        addr: String,
    },
    ConnectDone {
        network: &'static str,
        addr: String,
        error: Option<String>,
    },
    TlsHandshakeStart,
    TlsHandshakeDone {
        server_name: String,
        version: Option<String>,
        cipher_suite: Option<String>,
        negotiated_protocol: Option<String>,
        error: Option<String>,
    },
    GotConn {
        reused: bool,
        idle_time: Option<Duration>,
    },
    WroteHeaders,
    WroteRequest,
    FirstResponseByte,
    Response {
        status: u16,
        headers: HeaderList,
        content_length: Option<u64>,
    },
    ResponseError {
        error: String,
    },
    ResponseBody {
        body: BodySnapshot,
    },
}

impl TracePhase {
    /// Log message for this phase.
    pub fn name(&self) -> &'static str {
        match self {
            TracePhase::Request { .. } => "http request",
            TracePhase::DnsStart { .. } => "http trace dns start",
            TracePhase::DnsDone { .. } => "http trace dns done",
            TracePhase::ConnectStart { .. } => "http trace connect start",
            TracePhase::ConnectDone { .. } => "http trace connect done",
            TracePhase::TlsHandshakeStart => "http trace tls handshake start",
            TracePhase::TlsHandshakeDone { .. } => "http trace tls handshake done",
            TracePhase::GotConn { .. } => "http trace got conn",
            TracePhase::WroteHeaders => "http trace wrote headers",
            TracePhase::WroteRequest => "http trace wrote request",
            TracePhase::FirstResponseByte => "http trace first response byte",
            TracePhase::Response { .. } => "http response",
            TracePhase::ResponseError { .. } => "http response error",
            TracePhase::ResponseBody { .. } => "http response body",
        }
    }
}

/// One emitted record.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub exchange_id: ExchangeId,
    /// Time since the exchange started.
    pub elapsed: Duration,
    pub phase: TracePhase,
}

impl TraceEvent {
    /// The event as an ordered list of named fields.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.exchange_id.to_string()),
            ("phase", self.phase.name().to_string()),
            ("elapsed", format!("{:?}", self.elapsed)),
        ];
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match &self.phase {
            TracePhase::Request {
                method,
                target,
                headers,
                content_length,
                body,
                started_at,
            } => {
                fields.push(("method", method.clone()));
                fields.push(("url", target.clone()));
                fields.push(("headers", format_headers(headers)));
                fields.push(("content_length", format_length(*content_length)));
                push_body(&mut fields, body);
                if let Some(at) = started_at {
                    fields.push(("started_at", at.clone()));
                }
            }
            TracePhase::DnsStart { host } => fields.push(("host", host.clone())),
            TracePhase::DnsDone { addrs, error } => {
                fields.push(("addrs", addrs.join(",")));
                fields.push(("err", opt(error)));
            }
            TracePhase::ConnectStart { network, addr } => {
                fields.push(("network", network.to_string()));
                fields.push(("addr", addr.clone()));
            }
            TracePhase::ConnectDone {
                network,
                addr,
                error,
            } => {
                fields.push(("network", network.to_string()));
                fields.push(("addr", addr.clone()));
                fields.push(("err", opt(error)));
            }
            TracePhase::TlsHandshakeDone {
                server_name,
                version,
                cipher_suite,
                negotiated_protocol,
                error,
            } => {
                fields.push(("version", opt(version)));
                fields.push(("server_name", server_name.clone()));
                fields.push(("negotiated_protocol", opt(negotiated_protocol)));
                fields.push(("cipher_suite", opt(cipher_suite)));
                fields.push(("err", opt(error)));
            }
            TracePhase::GotConn { reused, idle_time } => {
                fields.push(("reused", reused.to_string()));
                fields.push(("was_idle", idle_time.is_some().to_string()));
                fields.push(("idle_time", format!("{:?}", idle_time.unwrap_or_default())));
            }
            TracePhase::Response {
                status,
                headers,
                content_length,
            } => {
                fields.push(("status_code", status.to_string()));
                fields.push(("headers", format_headers(headers)));
                fields.push(("content_length", format_length(*content_length)));
            }
            TracePhase::ResponseError { error } => fields.push(("err", error.clone())),
            TracePhase::ResponseBody { body } => {
                fields.push(("bytes_read", body.size.to_string()));
                fields.push(("body_truncated", body.truncated.to_string()));
                fields.push(("body_preview", body.preview_text().into_owned()));
            }
            TracePhase::TlsHandshakeStart
            | TracePhase::WroteHeaders
            | TracePhase::WroteRequest
            | TracePhase::FirstResponseByte => {}
        }
        fields
    }
}

fn push_body(fields: &mut Vec<(&'static str, String)>, body: &BodySnapshot) {
    fields.push(("body_size", body.size.to_string()));
    fields.push(("body_truncated", body.truncated.to_string()));
    fields.push(("body_preview", body.preview_text().into_owned()));
}

fn format_headers(headers: &HeaderList) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_length(length: Option<u64>) -> String {
    signed_length(length).to_string()
}

/// Declared length, -1 when unknown.
fn signed_length(length: Option<u64>) -> i64 {
    length.and_then(|n| i64::try_from(n).ok()).unwrap_or(-1)
}

/// Destination for trace events.
pub trait TraceSink: Send + Sync + 'static {
    fn emit(&self, event: TraceEvent);
}

/// Sink that turns events into `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&self, event: TraceEvent) {
        let id = event.exchange_id.as_u64();
        let elapsed = event.elapsed;
        let message = event.phase.name();
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();

        match &event.phase {
            TracePhase::Request {
                method,
                target,
                headers,
                content_length,
                body,
                started_at,
            } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                method = %method,
                url = %target,
                headers = %format_headers(headers),
                content_length = signed_length(*content_length),
                body_size = body.size,
                body_truncated = body.truncated,
                body_preview = %body.preview_text(),
                started_at = %opt(started_at),
                "{}",
                message
            ),
            TracePhase::DnsStart { host } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                host = %host,
                "{}",
                message
            ),
            TracePhase::DnsDone { addrs, error } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                addrs = %addrs.join(","),
                err = %opt(error),
                "{}",
                message
            ),
            TracePhase::ConnectStart { network, addr } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                network = *network,
                addr = %addr,
                "{}",
                message
            ),
            TracePhase::ConnectDone {
                network,
                addr,
                error,
            } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                network = *network,
                addr = %addr,
                err = %opt(error),
                "{}",
                message
            ),
            TracePhase::TlsHandshakeDone {
                server_name,
                version,
                cipher_suite,
                negotiated_protocol,
                error,
            } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                version = %opt(version),
                server_name = %server_name,
                negotiated_protocol = %opt(negotiated_protocol),
                cipher_suite = %opt(cipher_suite),
                err = %opt(error),
                "{}",
                message
            ),
            TracePhase::GotConn { reused, idle_time } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                reused = *reused,
                was_idle = idle_time.is_some(),
                idle_time = ?idle_time.unwrap_or_default(),
                "{}",
                message
            ),
            TracePhase::Response {
                status,
                headers,
                content_length,
            } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                status_code = *status,
                headers = %format_headers(headers),
                content_length = signed_length(*content_length),
                "{}",
                message
            ),
            TracePhase::ResponseError { error } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                err = %error,
                "{}",
                message
            ),
            TracePhase::ResponseBody { body } => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                bytes_read = body.size,
                body_truncated = body.truncated,
                body_preview = %body.preview_text(),
                "{}",
                message
            ),
            TracePhase::TlsHandshakeStart
            | TracePhase::WroteHeaders
            | TracePhase::WroteRequest
            | TracePhase::FirstResponseByte => tracing::info!(
                target: "opc_xmlda::net",
                id,
                ?elapsed,
                "{}",
                message
            ),
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TraceSink for MemorySink {
    fn emit(&self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Per-exchange handle: the id, the start instant and the sink.
///
/// Travels in request extensions so the exchanger underneath can report
/// connection phases for the right exchange.
#[derive(Clone)]
pub struct ExchangeTrace {
    id: ExchangeId,
    start: Instant,
    sink: Arc<dyn TraceSink>,
}

impl ExchangeTrace {
    pub fn new(id: ExchangeId, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            id,
            start: Instant::now(),
            sink,
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn emit(&self, phase: TracePhase) {
        self.sink.emit(TraceEvent {
            exchange_id: self.id,
            elapsed: self.elapsed(),
            phase,
        });
    }
}

impl fmt::Debug for ExchangeTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeTrace")
            .field("id", &self.id)
            .field("start", &self.start)
            .finish()
    }
}
