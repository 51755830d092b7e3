//! Request envelopes.

use crate::browse::BrowseRequest;
use crate::soap::read::ReadRequest;
use crate::soap::xml::push_attr;

/// OPC XML-DA 1.0 target namespace.
pub const XMLDA_NS: &str = "http://opcfoundation.org/webservices/XMLDA/1.0/";

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// `SOAPAction` header value for an operation, quoted.
pub fn soap_action(operation: &str) -> String {
    format!("\"{XMLDA_NS}{operation}\"")
}

fn wrap(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="{env}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#,
            "<soap:Body>{body}</soap:Body></soap:Envelope>"
        ),
        env = SOAP_ENV_NS,
        body = body
    )
}

/// Envelope for one browse page.
pub fn browse(request: &BrowseRequest) -> String {
    let mut element = format!("<Browse xmlns=\"{XMLDA_NS}\"");
    push_attr(&mut element, "LocaleID", &request.locale);
    push_attr(&mut element, "ClientRequestHandle", &request.client_handle);
    push_attr(&mut element, "ItemPath", &request.item_path);
    push_attr(&mut element, "ItemName", &request.item_name);
    push_attr(&mut element, "ContinuationPoint", &request.continuation_point);
    push_attr(&mut element, "MaxElementsReturned", "0");
    push_attr(&mut element, "BrowseFilter", request.filter.as_str());
    push_attr(&mut element, "ReturnAllProperties", "false");
    push_attr(&mut element, "ReturnPropertyValues", "false");
    push_attr(
        &mut element,
        "ReturnErrorText",
        if request.return_error_text { "true" } else { "false" },
    );
    element.push_str("/>");
    wrap(&element)
}

/// Envelope for GetStatus.
pub fn get_status(locale: &str, client_handle: &str) -> String {
    let mut element = format!("<GetStatus xmlns=\"{XMLDA_NS}\"");
    push_attr(&mut element, "LocaleID", locale);
    push_attr(&mut element, "ClientRequestHandle", client_handle);
    element.push_str("/>");
    wrap(&element)
}

/// Envelope reading one item with every optional reply field requested.
pub fn read(request: &ReadRequest) -> String {
    let mut options = String::from("<Options");
    for flag in [
        "ReturnErrorText",
        "ReturnDiagnosticInfo",
        "ReturnItemTime",
        "ReturnItemPath",
        "ReturnItemName",
    ] {
        push_attr(&mut options, flag, "true");
    }
    push_attr(&mut options, "ClientRequestHandle", &request.client_handle);
    push_attr(&mut options, "LocaleID", &request.locale);
    options.push_str("/>");

    let mut item = String::from("<Items");
    push_attr(&mut item, "ItemPath", &request.item_path);
    push_attr(&mut item, "ItemName", &request.item_name);
    item.push_str("/>");

    wrap(&format!(
        "<Read xmlns=\"{XMLDA_NS}\">{options}<ItemList>{item}</ItemList></Read>"
    ))
}
