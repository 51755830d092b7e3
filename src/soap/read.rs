//! Single item Read: request, reply and text report.

use std::io::{self, Write};

use crate::browse::{format_opc_errors, OpcError};
use crate::soap::status::{indented, write_reply_base, ReplyBase};
use crate::xsd::XsdDateTime;

/// The item to read and the request header values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub locale: String,
    pub client_handle: String,
    pub item_path: String,
    pub item_name: String,
}

impl ReadRequest {
    pub fn names_item(&self) -> bool {
        !self.item_path.is_empty() || !self.item_name.is_empty()
    }
}

/// OPC quality triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpcQuality {
    pub quality: Option<String>,
    pub limit: Option<String>,
    pub vendor: u8,
}

impl OpcQuality {
    /// `quality=…, limit=…, vendor=…`, listing present parts only.
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(quality) = &self.quality {
            parts.push(format!("quality={quality}"));
        }
        if let Some(limit) = &self.limit {
            parts.push(format!("limit={limit}"));
        }
        if self.vendor != 0 {
            parts.push(format!("vendor={}", self.vendor));
        }
        parts.join(", ")
    }
}

/// Value payload as sent: its text and declared `xsi:type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemData {
    pub value_type: Option<String>,
    /// Scalar text, or `[a, b, …]` for array values.
    pub text: String,
}

/// One item of a read reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemValue {
    pub item_path: String,
    pub item_name: String,
    pub client_item_handle: String,
    pub result_id: Option<String>,
    pub value_type_qualifier: Option<String>,
    pub value: Option<ItemData>,
    pub timestamp: XsdDateTime,
    pub quality: Option<OpcQuality>,
    pub diagnostic_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReply {
    pub result: Option<ReplyBase>,
    /// `None` when the reply had no item list at all.
    pub items: Option<Vec<ItemValue>>,
    pub errors: Vec<OpcError>,
}

/// Render a read reply, present fields only.
pub fn write_read<W: Write>(reply: &ReadReply, out: &mut W) -> io::Result<()> {
    if let Some(result) = &reply.result {
        write_reply_base(out, "ReadResult", result)?;
    }

    if let Some(items) = &reply.items {
        writeln!(out, "Items:")?;
        for item in items {
            write_item(out, item)?;
        }
    }

    if !reply.errors.is_empty() {
        writeln!(out, "Errors: {}", format_opc_errors(&reply.errors))?;
    }
    out.flush()
}

fn write_item<W: Write>(out: &mut W, item: &ItemValue) -> io::Result<()> {
    const INDENT: &str = "    ";

    writeln!(out, "  - Item")?;
    indented(out, INDENT, "ItemName", &item.item_name)?;
    indented(out, INDENT, "ItemPath", &item.item_path)?;
    indented(out, INDENT, "ClientItemHandle", &item.client_item_handle)?;
    if let Some(result_id) = &item.result_id {
        writeln!(out, "{INDENT}ResultID: {result_id}")?;
    }
    if let Some(qualifier) = &item.value_type_qualifier {
        writeln!(out, "{INDENT}ValueTypeQualifier: {qualifier}")?;
    }
    if let Some(value) = &item.value {
        match &value.value_type {
            Some(value_type) => writeln!(out, "{INDENT}Value: {} ({value_type})", value.text)?,
            None => writeln!(out, "{INDENT}Value: {}", value.text)?,
        }
    }
    if let Some(timestamp) = item.timestamp.format() {
        writeln!(out, "{INDENT}Timestamp: {timestamp}")?;
    }
    if let Some(quality) = &item.quality {
        indented(out, INDENT, "Quality", &quality.describe())?;
    }
    indented(out, INDENT, "DiagnosticInfo", &item.diagnostic_info)
}
