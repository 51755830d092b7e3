//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! main.rs:
//!     request timeout → CancelToken deadline
//!     Ctrl-C          → CancelSource::trigger
//!
//! Traversal:
//!     check() before every fetch, cancelled() raced against each call
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative; in-flight calls are dropped, not aborted
//! - One token carries both the signal and the deadline

pub mod cancel;

pub use cancel::{CancelReason, CancelSource, CancelToken};
