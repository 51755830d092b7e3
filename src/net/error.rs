//! Transport-level failures.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used for foreign body errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Network, IO and HTTP failures of a single exchange.
///
/// Wrappers around an exchanger pass these through unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request target is not an absolute http/https URI with a host.
    #[error("invalid request target {0:?}")]
    InvalidTarget(String),

    /// Name resolution failed or returned no addresses.
    #[error("dns lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Every resolved address refused the TCP connection.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS client setup or handshake failed.
    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// DNS, TCP and TLS did not finish within the connect timeout.
    #[error("connection setup timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The whole exchange did not finish within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP protocol failure on an established connection.
    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    /// A request or response body could not be read.
    #[error("body: {0}")]
    Body(#[source] BoxError),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "request timed out after 3s");

        let err = TransportError::Connect {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().starts_with("connect to 127.0.0.1:1 failed"));
    }
}
