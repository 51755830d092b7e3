//! Failures of a single SOAP call.

use thiserror::Error;

use crate::net::error::TransportError;
use crate::xsd::CodecError;

/// Why one RPC produced no usable reply.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The exchange itself failed; passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a SOAP fault.
    #[error("soap fault {code}: {message}")]
    Fault { code: String, message: String },

    /// Non-success HTTP status without a fault body.
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The reply was not the expected XML.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A timestamp in the reply could not be read.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A read named neither an item path nor an item name.
    #[error("read requires an item path or item name")]
    MissingItem,

    /// The request could not be built from its parts.
    #[error("invalid request: {0}")]
    Request(#[from] http::Error),
}

impl From<quick_xml::Error> for RpcError {
    fn from(err: quick_xml::Error) -> Self {
        RpcError::Decode(err.to_string())
    }
}
