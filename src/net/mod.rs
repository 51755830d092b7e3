//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Request<Full<Bytes>> (absolute URI, optional ExchangeTrace extension)
//!     → exchanger.rs (pool checkout or DNS + TCP connect)
//!     → tls.rs (optional TLS handshake)
//!     → milestone.rs (write/read milestones on the socket)
//!     → hyper http1 connection
//!     → Response<Incoming>
//! ```
//!
//! # Design Decisions
//! - Connect timeout covers DNS, TCP and TLS; the request timeout is the caller's
//! - Phase events are only produced when a trace handle rides on the request

pub mod error;
pub mod exchanger;
pub mod milestone;
pub mod tls;

pub use error::{BoxError, TransportError, TransportResult};
pub use exchanger::HttpExchanger;
