//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Request line and headers, lowercased.
    pub head: String,
    pub body: String,
}

impl Recorded {
    /// Value of an XML attribute in the request body, or empty.
    pub fn attr(&self, name: &str) -> String {
        let needle = format!(" {name}=\"");
        self.body
            .find(&needle)
            .and_then(|start| {
                let rest = &self.body[start + needle.len()..];
                rest.find('"').map(|end| rest[..end].to_string())
            })
            .unwrap_or_default()
    }
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

/// Start a keep-alive mock backend on a loopback port.
///
/// Every request is answered by `f` with a status and a body.
#[allow(dead_code)]
pub async fn start_programmable_backend<F>(f: F) -> (SocketAddr, Log)
where
    F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Log::default();
    let f = Arc::new(f);

    let seen = log.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let mut pending = Vec::new();
                        while let Some(request) = read_request(&mut socket, &mut pending).await {
                            seen.lock().unwrap().push(request.clone());
                            let (status, body) = f(&request);
                            let status_text = match status {
                                200 => "200 OK",
                                400 => "400 Bad Request",
                                500 => "500 Internal Server Error",
                                503 => "503 Service Unavailable",
                                _ => "200 OK",
                            };
                            let response = format!(
                                "HTTP/1.1 {}\r\nContent-Type: text/xml; charset=utf-8\r\nSet-Cookie: session=backend-secret\r\nContent-Length: {}\r\n\r\n{}",
                                status_text,
                                body.len(),
                                body
                            );
                            if socket.write_all(response.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

/// Start a backend that accepts connections and never answers.
#[allow(dead_code)]
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Start a backend that answers any bytes with a plain-text HTTP 400 and hangs up.
///
/// A TLS client talking to it fails its handshake.
#[allow(dead_code)]
pub async fn start_plaintext_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream, pending: &mut Vec<u8>) -> Option<Recorded> {
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        pending.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&pending[..head_end]).to_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while pending.len() < head_end + length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        pending.extend_from_slice(&buf[..n]);
    }

    let body = String::from_utf8_lossy(&pending[head_end..head_end + length]).into_owned();
    pending.drain(..head_end + length);
    Some(Recorded { head, body })
}

/// Wrap a SOAP body in an envelope.
#[allow(dead_code)]
pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{body}</soap:Body></soap:Envelope>"#
    )
}

/// A browse reply listing `(name, has_children)` elements below `parent`.
#[allow(dead_code)]
pub fn browse_reply(parent: &str, elements: &[(&str, bool)], continuation: &str) -> String {
    let mut xml = format!(
        r#"<BrowseResponse xmlns="http://opcfoundation.org/webservices/XMLDA/1.0/" ContinuationPoint="{continuation}" MoreElements="{}">"#,
        !continuation.is_empty()
    );
    for (name, has_children) in elements {
        let item_name = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}.{name}")
        };
        xml.push_str(&format!(
            r#"<Elements Name="{name}" ItemName="{item_name}" IsItem="{}" HasChildren="{has_children}"/>"#,
            !has_children
        ));
    }
    xml.push_str("</BrowseResponse>");
    envelope(&xml)
}
