//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing request:
//!     → headers.rs (attach basic auth when configured)
//! Observed request/response:
//!     → headers.rs (redact secrets before any trace event)
//! ```
//!
//! # Design Decisions
//! - Credentials are marked sensitive on the header value itself
//! - Redaction happens before events reach any sink

pub mod headers;

pub use headers::{basic_auth, redact_headers, REDACTED};
