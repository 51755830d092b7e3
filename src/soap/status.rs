//! GetStatus reply and its text report.

use std::io::{self, Write};

use crate::xsd::XsdDateTime;

/// Header fields shared by every OPC XML-DA reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyBase {
    pub rcv_time: XsdDateTime,
    pub reply_time: XsdDateTime,
    pub client_request_handle: String,
    pub revised_locale_id: String,
    pub server_state: Option<String>,
}

/// Server identity and capabilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStatus {
    pub status_info: String,
    pub vendor_info: String,
    pub product_version: String,
    pub start_time: XsdDateTime,
    pub supported_locale_ids: Vec<String>,
    pub supported_interface_versions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReply {
    pub result: Option<ReplyBase>,
    pub status: Option<ServerStatus>,
}

/// Render the present fields, one per line. Absent timestamps are skipped.
pub fn write_status<W: Write>(reply: &StatusReply, out: &mut W) -> io::Result<()> {
    if let Some(result) = &reply.result {
        write_reply_base(out, "GetStatusResult", result)?;
    }

    if let Some(status) = &reply.status {
        writeln!(out, "Status:")?;
        line(out, "StatusInfo", &status.status_info)?;
        line(out, "VendorInfo", &status.vendor_info)?;
        line(out, "ProductVersion", &status.product_version)?;
        time(out, "StartTime", &status.start_time)?;
        line(out, "SupportedLocaleIDs", &status.supported_locale_ids.join(", "))?;
        line(
            out,
            "SupportedInterfaceVersions",
            &status.supported_interface_versions.join(", "),
        )?;
    }
    out.flush()
}

/// `label:` followed by the present reply header fields.
pub(crate) fn write_reply_base<W: Write>(out: &mut W, label: &str, base: &ReplyBase) -> io::Result<()> {
    writeln!(out, "{label}:")?;
    if let Some(state) = &base.server_state {
        writeln!(out, "  ServerState: {state}")?;
    }
    line(out, "RevisedLocaleID", &base.revised_locale_id)?;
    line(out, "ClientRequestHandle", &base.client_request_handle)?;
    time(out, "ReplyTime", &base.reply_time)?;
    time(out, "ReceiveTime", &base.rcv_time)
}

fn line<W: Write>(out: &mut W, label: &str, value: &str) -> io::Result<()> {
    indented(out, "  ", label, value)
}

fn time<W: Write>(out: &mut W, label: &str, value: &XsdDateTime) -> io::Result<()> {
    match value.format() {
        Some(text) => writeln!(out, "  {label}: {text}"),
        None => Ok(()),
    }
}

/// `indent label: value`, skipped when the value is empty.
pub(crate) fn indented<W: Write>(out: &mut W, indent: &str, label: &str, value: &str) -> io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    writeln!(out, "{indent}{label}: {value}")
}
