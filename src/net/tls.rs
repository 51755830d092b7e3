//! TLS client configuration.

use std::sync::Arc;

use rustls::{ClientConfig, ProtocolVersion, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::net::error::TransportError;

/// Build a connector trusting the webpki root set, offering HTTP/1.1 via ALPN.
pub fn client_connector() -> Result<TlsConnector, TransportError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls {
            host: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Short protocol version label, e.g. `TLS1.3`.
pub fn version_label(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLS1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLS1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLS1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLS1.0".to_string(),
        other => format!("{other:?}"),
    }
}
