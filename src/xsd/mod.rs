//! XML Schema value codecs used on the OPC XML-DA wire.

pub mod datetime;

pub use datetime::{CodecError, XsdDateTime};
