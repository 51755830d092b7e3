//! OPC XML-DA client library.
//!
//! Browses a server's namespace and reads its status over SOAP, with an
//! optional tracing layer around every HTTP exchange.

pub mod browse;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod soap;
pub mod xsd;

pub use browse::{Traversal, TraversalOptions};
pub use config::ClientConfig;
pub use lifecycle::{CancelSource, CancelToken};
pub use net::HttpExchanger;
pub use observability::ObservedLayer;
pub use soap::SoapClient;
