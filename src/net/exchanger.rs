//! Default HTTP/1.1 exchanger.
//!
//! # Responsibilities
//! - Resolve, connect and (for https) handshake under a connect timeout
//! - Keep idle keep-alive connections per origin and reuse them
//! - Report connection phases to the exchange trace, when one is attached
//!
//! # Design Decisions
//! - One hyper http1 connection per socket; the connection task is spawned
//! - A connection goes back to the pool only once hyper reports it ready,
//!   i.e. after the previous response body was read to the end
//! - Requests are sent in origin form with a Host header

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{CONNECTION, HOST};
use http::uri::{PathAndQuery, Scheme};
use http::{HeaderValue, Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower::Service;

use crate::net::error::{TransportError, TransportResult};
use crate::net::milestone::{MilestoneIo, MilestoneSlot};
use crate::net::tls::{client_connector, version_label};
use crate::observability::events::{ExchangeTrace, TracePhase};

/// Idle connections kept per origin.
const MAX_IDLE_PER_ORIGIN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Origin {
    tls: bool,
    host: String,
    port: u16,
}

impl Origin {
    fn of(uri: &Uri) -> TransportResult<Self> {
        let invalid = || TransportError::InvalidTarget(uri.to_string());
        let tls = match uri.scheme() {
            Some(s) if *s == Scheme::HTTPS => true,
            Some(s) if *s == Scheme::HTTP => false,
            _ => return Err(invalid()),
        };
        let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        Ok(Self {
            tls,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
        })
    }
}

struct Idle {
    sender: SendRequest<Full<Bytes>>,
    milestones: MilestoneSlot,
    since: Instant,
}

/// A connection checked out for one exchange.
struct Leased {
    sender: SendRequest<Full<Bytes>>,
    milestones: MilestoneSlot,
}

#[derive(Default)]
struct Pool {
    idle: Mutex<HashMap<Origin, Vec<Idle>>>,
}

impl Pool {
    /// Take the most recently parked live connection for `origin`.
    fn checkout(&self, origin: &Origin) -> Option<(Leased, Duration)> {
        let mut idle = self.idle.lock().ok()?;
        let parked = idle.get_mut(origin)?;
        while let Some(entry) = parked.pop() {
            if entry.sender.is_closed() || !entry.sender.is_ready() {
                continue;
            }
            return Some((
                Leased {
                    sender: entry.sender,
                    milestones: entry.milestones,
                },
                entry.since.elapsed(),
            ));
        }
        None
    }

    fn park(&self, origin: Origin, leased: Leased) {
        if let Ok(mut idle) = self.idle.lock() {
            let parked = idle.entry(origin).or_default();
            parked.retain(|entry| !entry.sender.is_closed());
            if parked.len() < MAX_IDLE_PER_ORIGIN {
                parked.push(Idle {
                    sender: leased.sender,
                    milestones: leased.milestones,
                    since: Instant::now(),
                });
            }
        }
    }

    fn len(&self) -> usize {
        self.idle
            .lock()
            .map(|idle| idle.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

struct Inner {
    connect_timeout: Duration,
    tls: TlsConnector,
    pool: Pool,
}

/// Pooling HTTP/1.1 client implementing `tower::Service`.
#[derive(Clone)]
pub struct HttpExchanger {
    inner: Arc<Inner>,
}

impl HttpExchanger {
    /// `connect_timeout` bounds DNS, TCP and TLS together; zero disables it.
    pub fn new(connect_timeout: Duration) -> TransportResult<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                connect_timeout,
                tls: client_connector()?,
                pool: Pool::default(),
            }),
        })
    }

    /// Number of parked keep-alive connections.
    pub fn idle_connections(&self) -> usize {
        self.inner.pool.len()
    }
}

impl Service<Request<Full<Bytes>>> for HttpExchanger {
    type Response = Response<Incoming>;
    type Error = TransportError;
    type Future = BoxFuture<'static, TransportResult<Response<Incoming>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Full<Bytes>>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { exchange(inner, request).await })
    }
}

async fn exchange(
    inner: Arc<Inner>,
    request: Request<Full<Bytes>>,
) -> TransportResult<Response<Incoming>> {
    let origin = Origin::of(request.uri())?;
    let trace = request.extensions().get::<ExchangeTrace>().cloned();
    let request = to_origin_form(request, &origin)?;

    let mut leased = match inner.pool.checkout(&origin) {
        Some((leased, idle_for)) => {
            emit(&trace, || TracePhase::GotConn {
                reused: true,
                idle_time: Some(idle_for),
            });
            leased
        }
        None => {
            let leased = bounded(inner.connect_timeout, connect(&inner.tls, &origin, &trace)).await?;
            emit(&trace, || TracePhase::GotConn {
                reused: false,
                idle_time: None,
            });
            leased
        }
    };

    leased.milestones.arm(trace);
    let result = leased.sender.send_request(request).await;

    // Park once the response body has been drained and the connection is free again.
    let keep_alive = result.as_ref().is_ok_and(|response| {
        !response
            .headers()
            .get(CONNECTION)
            .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"close"))
    });
    if keep_alive {
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            if leased.sender.ready().await.is_ok() {
                leased.milestones.arm(None);
                inner.pool.park(origin, leased);
            }
        });
    }

    Ok(result?)
}

/// Rewrite an absolute-form request for the wire.
fn to_origin_form(request: Request<Full<Bytes>>, origin: &Origin) -> TransportResult<Request<Full<Bytes>>> {
    let (mut parts, body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    if !parts.headers.contains_key(HOST) {
        let default_port = if origin.tls { 443 } else { 80 };
        let authority = match parts.uri.authority() {
            Some(a) if origin.port == default_port => a.host().to_string(),
            Some(a) => a.as_str().rsplit_once('@').map_or(a.as_str(), |(_, host)| host).to_string(),
            None => origin.host.clone(),
        };
        let host = HeaderValue::from_str(&authority)
            .map_err(|_| TransportError::InvalidTarget(parts.uri.to_string()))?;
        parts.headers.insert(HOST, host);
    }

    parts.uri = Uri::from(path);
    Ok(Request::from_parts(parts, body))
}

async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = TransportResult<T>>,
) -> TransportResult<T> {
    if limit.is_zero() {
        return fut.await;
    }
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransportError::ConnectTimeout(limit))?
}

fn emit(trace: &Option<ExchangeTrace>, phase: impl FnOnce() -> TracePhase) {
    if let Some(trace) = trace {
        trace.emit(phase());
    }
}

async fn connect(
    tls: &TlsConnector,
    origin: &Origin,
    trace: &Option<ExchangeTrace>,
) -> TransportResult<Leased> {
    let tcp = dial(origin, trace).await?;
    let io = if origin.tls {
        Stream::Tls(Box::new(handshake(tls, origin, tcp, trace).await?))
    } else {
        Stream::Plain(tcp)
    };

    let milestones = MilestoneSlot::default();
    let (sender, connection) = http1::handshake(TokioIo::new(MilestoneIo::new(io, milestones.clone()))).await?;
    let host = origin.host.clone();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(host = %host, error = %e, "Connection closed with error");
        }
    });

    Ok(Leased { sender, milestones })
}

async fn dial(origin: &Origin, trace: &Option<ExchangeTrace>) -> TransportResult<TcpStream> {
    emit(trace, || TracePhase::DnsStart {
        host: origin.host.clone(),
    });
    let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((origin.host.as_str(), origin.port)).await {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            emit(trace, || TracePhase::DnsDone {
                addrs: Vec::new(),
                error: Some(e.to_string()),
            });
            return Err(TransportError::Dns {
                host: origin.host.clone(),
                source: e,
            });
        }
    };
    emit(trace, || TracePhase::DnsDone {
        addrs: addrs.iter().map(ToString::to_string).collect(),
        error: None,
    });

    let mut last = None;
    for addr in addrs {
        emit(trace, || TracePhase::ConnectStart {
            network: "tcp",
            addr: addr.to_string(),
        });
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                emit(trace, || TracePhase::ConnectDone {
                    network: "tcp",
                    addr: addr.to_string(),
                    error: None,
                });
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                emit(trace, || TracePhase::ConnectDone {
                    network: "tcp",
                    addr: addr.to_string(),
                    error: Some(e.to_string()),
                });
                last = Some((addr, e));
            }
        }
    }

    Err(match last {
        Some((addr, source)) => TransportError::Connect {
            addr: addr.to_string(),
            source,
        },
        None => TransportError::Dns {
            host: origin.host.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        },
    })
}

async fn handshake(
    tls: &TlsConnector,
    origin: &Origin,
    tcp: TcpStream,
    trace: &Option<ExchangeTrace>,
) -> TransportResult<TlsStream<TcpStream>> {
    let tls_error = |source: io::Error| TransportError::Tls {
        host: origin.host.clone(),
        source,
    };
    let server_name = ServerName::try_from(origin.host.clone())
        .map_err(|e| tls_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    emit(trace, || TracePhase::TlsHandshakeStart);
    match tls.connect(server_name, tcp).await {
        Ok(stream) => {
            let (_, session) = stream.get_ref();
            emit(trace, || TracePhase::TlsHandshakeDone {
                server_name: origin.host.clone(),
                version: session.protocol_version().map(version_label),
                cipher_suite: session
                    .negotiated_cipher_suite()
                    .map(|suite| format!("{:?}", suite.suite())),
                negotiated_protocol: session
                    .alpn_protocol()
                    .map(|p| String::from_utf8_lossy(p).into_owned()),
                error: None,
            });
            Ok(stream)
        }
        Err(e) => {
            emit(trace, || TracePhase::TlsHandshakeDone {
                server_name: origin.host.clone(),
                version: None,
                cipher_suite: None,
                negotiated_protocol: None,
                error: Some(e.to_string()),
            });
            Err(tls_error(e))
        }
    }
}

/// Plain or TLS socket.
enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
