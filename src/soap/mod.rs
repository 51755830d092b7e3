//! OPC XML-DA over SOAP 1.1.
//!
//! # Data Flow
//! ```text
//! BrowseRequest / ReadRequest / GetStatus arguments
//!     → envelope.rs (request XML)
//!     → client.rs (POST over the exchanger, timeout, auth)
//!     → xml.rs (element tree) → decode.rs (typed reply or fault)
//! ```
//!
//! # Design Decisions
//! - Browse, Read (one item) and GetStatus are spoken; Write and Subscribe are not
//! - Timestamps go through the xsd codec; a malformed one fails the call

pub mod client;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod read;
pub mod status;
pub mod xml;

pub use client::SoapClient;
pub use envelope::XMLDA_NS;
pub use error::RpcError;
pub use read::{write_read, ItemData, ItemValue, OpcQuality, ReadReply, ReadRequest};
pub use status::{write_status, ReplyBase, ServerStatus, StatusReply};
