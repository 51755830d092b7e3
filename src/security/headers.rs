//! Header redaction and credential headers.
//!
//! # Responsibilities
//! - Copy header maps for diagnostics with secrets replaced
//! - Build the basic auth `Authorization` value
//!
//! # Design Decisions
//! - Fixed denylist, matched case-insensitively
//! - Redacted values never leave this module in clear text

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::InvalidHeaderValue;
use http::{HeaderMap, HeaderValue};

use crate::observability::events::HeaderList;

/// Replacement text for sensitive header values.
pub const REDACTED: &str = "<redacted>";

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// True for headers whose values must never be logged.
pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Copy `headers` in order, replacing sensitive values.
pub fn redact_headers(headers: &HeaderMap) -> HeaderList {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive(name.as_str()) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// `Authorization: Basic ...` value for the given credentials.
pub fn basic_auth(username: &str, password: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let token = STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))?;
    value.set_sensitive(true);
    Ok(value)
}
