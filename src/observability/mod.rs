//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → transport.rs (Observed<S>: id, redaction, request capture)
//!         → exchanger emits connection phases via the ExchangeTrace
//!     → Response headers traced, body wrapped by capture.rs
//!     → events.rs (TraceEvent → TraceSink, `tracing` by default)
//!
//! Everything else:
//!     → logging.rs (fmt subscriber on stderr)
//! ```
//!
//! # Design Decisions
//! - Structured fields, one record per phase
//! - Exchange id flows through every record of one exchange
//! - Tracing is opt-in per transport; the default path adds nothing

pub mod capture;
pub mod events;
pub mod logging;
pub mod transport;

pub use capture::{CapturedBody, PreviewBuffer, DEFAULT_CAPTURE_BUDGET};
pub use events::{
    BodySnapshot, ExchangeId, ExchangeTrace, MemorySink, TraceEvent, TracePhase, TraceSink,
    TracingSink,
};
pub use logging::{init_logging, level_name};
pub use transport::{Observed, ObservedLayer, ABANDONED};
