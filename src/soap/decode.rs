//! Reply decoding.

use crate::browse::{BrowseElement, BrowsePage, OpcError};
use crate::soap::error::RpcError;
use crate::soap::read::{ItemData, ItemValue, OpcQuality, ReadReply};
use crate::soap::status::{ReplyBase, ServerStatus, StatusReply};
use crate::soap::xml::Element;
use crate::xsd::XsdDateTime;

/// The single element inside `Envelope/Body`.
///
/// A `Fault` in the body is returned as [`RpcError::Fault`].
pub fn body_payload(xml: &str) -> Result<Element, RpcError> {
    let envelope = Element::parse(xml)?;
    if envelope.name != "Envelope" {
        return Err(RpcError::Decode(format!("expected Envelope, found {}", envelope.name)));
    }
    let body = envelope
        .child("Body")
        .ok_or_else(|| RpcError::Decode("envelope has no Body".into()))?;
    let payload = body
        .children
        .first()
        .ok_or_else(|| RpcError::Decode("empty Body".into()))?;

    if payload.name == "Fault" {
        return Err(fault(payload));
    }
    Ok(payload.clone())
}

fn fault(element: &Element) -> RpcError {
    RpcError::Fault {
        code: element.child_text("faultcode").trim().to_string(),
        message: element.child_text("faultstring").trim().to_string(),
    }
}

fn payload_named<'a>(payload: &'a Element, name: &str) -> Result<&'a Element, RpcError> {
    if payload.name == name {
        Ok(payload)
    } else {
        Err(RpcError::Decode(format!("expected {name}, found {}", payload.name)))
    }
}

fn timestamp(element: &Element, name: &str) -> Result<XsdDateTime, RpcError> {
    Ok(XsdDateTime::parse(element.attr_or_empty(name).trim())?)
}

fn reply_base(element: &Element) -> Result<ReplyBase, RpcError> {
    Ok(ReplyBase {
        rcv_time: timestamp(element, "RcvTime")?,
        reply_time: timestamp(element, "ReplyTime")?,
        client_request_handle: element.attr_or_empty("ClientRequestHandle").to_string(),
        revised_locale_id: element.attr_or_empty("RevisedLocaleID").to_string(),
        server_state: element.attr("ServerState").map(str::to_string),
    })
}

fn opc_error(element: &Element) -> OpcError {
    // Text is a child element in the schema; some servers inline it.
    let text = match element.child("Text") {
        Some(text) => text.text.clone(),
        None => element.text.clone(),
    };
    OpcError {
        id: element.attr("ID").map(str::to_string),
        text,
    }
}

/// Decode a `BrowseResponse` envelope.
pub fn browse_response(xml: &str) -> Result<BrowsePage, RpcError> {
    let payload = body_payload(xml)?;
    let response = payload_named(&payload, "BrowseResponse")?;

    let elements = response
        .children("Elements")
        .map(|e| BrowseElement {
            name: e.attr_or_empty("Name").to_string(),
            item_path: e.attr_or_empty("ItemPath").to_string(),
            item_name: e.attr_or_empty("ItemName").to_string(),
            is_item: e.flag("IsItem"),
            has_children: e.flag("HasChildren"),
        })
        .collect();

    Ok(BrowsePage {
        elements,
        more_elements: response.flag("MoreElements"),
        continuation_point: response.attr_or_empty("ContinuationPoint").to_string(),
        errors: response.children("Errors").map(opc_error).collect(),
    })
}

/// Decode a `GetStatusResponse` envelope.
pub fn get_status_response(xml: &str) -> Result<StatusReply, RpcError> {
    let payload = body_payload(xml)?;
    let response = payload_named(&payload, "GetStatusResponse")?;

    let result = response.child("GetStatusResult").map(reply_base).transpose()?;
    let status = match response.child("Status") {
        Some(status) => Some(ServerStatus {
            status_info: status.child_text("StatusInfo").to_string(),
            vendor_info: status.child_text("VendorInfo").to_string(),
            product_version: status.attr_or_empty("ProductVersion").to_string(),
            start_time: timestamp(status, "StartTime")?,
            supported_locale_ids: status
                .children("SupportedLocaleIDs")
                .map(|e| e.text.clone())
                .collect(),
            supported_interface_versions: status
                .children("SupportedInterfaceVersions")
                .map(|e| e.text.clone())
                .collect(),
        }),
        None => None,
    };

    Ok(StatusReply { result, status })
}

fn quality(element: &Element) -> Result<OpcQuality, RpcError> {
    let vendor = match element.attr("VendorField").map(str::trim) {
        None | Some("") => 0,
        Some(text) => text
            .parse()
            .map_err(|_| RpcError::Decode(format!("invalid VendorField {text:?}")))?,
    };
    Ok(OpcQuality {
        quality: element.attr("QualityField").map(str::to_string),
        limit: element.attr("LimitField").map(str::to_string),
        vendor,
    })
}

fn item_data(element: &Element) -> ItemData {
    let text = if element.children.is_empty() {
        element.text.clone()
    } else {
        let values: Vec<&str> = element.children.iter().map(|c| c.text.as_str()).collect();
        format!("[{}]", values.join(", "))
    };
    ItemData {
        value_type: element.attr("type").map(str::to_string),
        text,
    }
}

fn item_value(element: &Element) -> Result<ItemValue, RpcError> {
    Ok(ItemValue {
        item_path: element.attr_or_empty("ItemPath").to_string(),
        item_name: element.attr_or_empty("ItemName").to_string(),
        client_item_handle: element.attr_or_empty("ClientItemHandle").to_string(),
        result_id: element.attr("ResultID").map(str::to_string),
        value_type_qualifier: element.attr("ValueTypeQualifier").map(str::to_string),
        value: element.child("Value").map(item_data),
        timestamp: timestamp(element, "Timestamp")?,
        quality: element.child("Quality").map(quality).transpose()?,
        diagnostic_info: element.child_text("DiagnosticInfo").to_string(),
    })
}

/// Decode a `ReadResponse` envelope.
pub fn read_response(xml: &str) -> Result<ReadReply, RpcError> {
    let payload = body_payload(xml)?;
    let response = payload_named(&payload, "ReadResponse")?;

    let items = match response.child("RItemList") {
        Some(list) => Some(
            list.children("Items")
                .map(item_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    Ok(ReadReply {
        result: response.child("ReadResult").map(reply_base).transpose()?,
        items,
        errors: response.children("Errors").map(opc_error).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{body}</soap:Body></soap:Envelope>"#
        )
    }

    #[test]
    fn browse_page_with_continuation() {
        let xml = envelope(
            r#"<BrowseResponse xmlns="http://opcfoundation.org/webservices/XMLDA/1.0/" ContinuationPoint="t1" MoreElements="true">
                <BrowseResult RcvTime="2024-01-01T00:00:00Z" ReplyTime="2024-01-01T00:00:01Z" ServerState="running"/>
                <Elements Name="Line1" ItemPath="Plant" ItemName="Plant.Line1" IsItem="false" HasChildren="true">
                    <Properties Name="dataType"/>
                </Elements>
                <Elements Name="Speed" ItemName="Plant.Speed" IsItem="true" HasChildren="false"/>
            </BrowseResponse>"#,
        );
        let page = browse_response(&xml).unwrap();
        assert!(page.more_elements);
        assert_eq!(page.continuation_point, "t1");
        assert_eq!(page.elements.len(), 2);
        assert_eq!(page.elements[0].item_path, "Plant");
        assert!(page.elements[0].has_children);
        assert!(page.elements[1].is_item);
        assert!(page.errors.is_empty());
    }

    #[test]
    fn browse_errors_are_collected() {
        let xml = envelope(
            r#"<BrowseResponse><Errors ID="E_UNKNOWNITEMNAME"><Text>The item name is not known</Text></Errors><Errors>inline</Errors></BrowseResponse>"#,
        );
        let page = browse_response(&xml).unwrap();
        assert_eq!(
            page.errors,
            vec![
                OpcError {
                    id: Some("E_UNKNOWNITEMNAME".into()),
                    text: "The item name is not known".into(),
                },
                OpcError {
                    id: None,
                    text: "inline".into(),
                },
            ]
        );
    }

    #[test]
    fn fault_is_reported() {
        let xml = envelope(
            "<soap:Fault><faultcode>soap:Client</faultcode><faultstring> bad request </faultstring></soap:Fault>",
        );
        match browse_response(&xml) {
            Err(RpcError::Fault { code, message }) => {
                assert_eq!(code, "soap:Client");
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_payload_is_decode_error() {
        let xml = envelope("<GetStatusResponse/>");
        assert!(matches!(browse_response(&xml), Err(RpcError::Decode(_))));
        assert!(matches!(browse_response("<html/>"), Err(RpcError::Decode(_))));
    }

    #[test]
    fn status_reply_decodes_timestamps() {
        let xml = envelope(
            r#"<GetStatusResponse>
                <GetStatusResult RcvTime="2024-05-01T12:00:00.25+02:00" ReplyTime="2024-05-01T12:00:01" RevisedLocaleID="en" ServerState="running"/>
                <Status StartTime="0001-01-01T00:00:00Z" ProductVersion="1.2.3">
                    <StatusInfo>OK</StatusInfo>
                    <VendorInfo>Acme</VendorInfo>
                    <SupportedLocaleIDs>en</SupportedLocaleIDs>
                    <SupportedLocaleIDs>de</SupportedLocaleIDs>
                    <SupportedInterfaceVersions>XML_DA_Version_1_0</SupportedInterfaceVersions>
                </Status>
            </GetStatusResponse>"#,
        );
        let reply = get_status_response(&xml).unwrap();

        let result = reply.result.unwrap();
        assert!(result.rcv_time.has_explicit_zone());
        assert!(!result.reply_time.has_explicit_zone());
        assert_eq!(result.reply_time.format().as_deref(), Some("2024-05-01T12:00:01Z"));
        assert_eq!(result.server_state.as_deref(), Some("running"));

        let status = reply.status.unwrap();
        assert!(status.start_time.is_zero());
        assert_eq!(status.product_version, "1.2.3");
        assert_eq!(status.supported_locale_ids, ["en", "de"]);
        assert_eq!(status.supported_interface_versions, ["XML_DA_Version_1_0"]);
    }

    #[test]
    fn bad_timestamp_is_codec_error() {
        let xml = envelope(r#"<GetStatusResponse><GetStatusResult ReplyTime="yesterday"/></GetStatusResponse>"#);
        assert!(matches!(get_status_response(&xml), Err(RpcError::Codec(_))));
    }

    #[test]
    fn read_reply_decodes_items() {
        let xml = envelope(
            r#"<ReadResponse xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
                <ReadResult RcvTime="2024-05-01T10:00:00Z" ReplyTime="2024-05-01T10:00:01Z" ServerState="running"/>
                <RItemList>
                    <Items ItemPath="" ItemName="Plant.Speed" Timestamp="2024-05-01T09:59:59" ValueTypeQualifier="xsd:double">
                        <DiagnosticInfo>cached</DiagnosticInfo>
                        <Value xsi:type="xsd:double">42.5</Value>
                        <Quality QualityField="good" LimitField="none"/>
                    </Items>
                    <Items ItemName="Plant.Levels">
                        <Value xsi:type="ArrayOfFloat"><float>1</float><float>2.5</float></Value>
                        <Quality VendorField="3"/>
                    </Items>
                    <Items ItemName="Plant.Missing" ResultID="E_UNKNOWNITEMNAME"/>
                </RItemList>
                <Errors ID="E_UNKNOWNITEMNAME"><Text>no such item</Text></Errors>
            </ReadResponse>"#,
        );
        let reply = read_response(&xml).unwrap();

        assert_eq!(reply.result.unwrap().server_state.as_deref(), Some("running"));
        let items = reply.items.unwrap();
        assert_eq!(items.len(), 3);

        let speed = &items[0];
        assert_eq!(speed.item_name, "Plant.Speed");
        assert_eq!(speed.diagnostic_info, "cached");
        assert_eq!(speed.value_type_qualifier.as_deref(), Some("xsd:double"));
        assert_eq!(
            speed.value,
            Some(ItemData {
                value_type: Some("xsd:double".into()),
                text: "42.5".into(),
            })
        );
        assert!(!speed.timestamp.has_explicit_zone());
        assert_eq!(speed.timestamp.format().as_deref(), Some("2024-05-01T09:59:59Z"));
        assert_eq!(speed.quality.as_ref().unwrap().describe(), "quality=good, limit=none");

        let levels = &items[1];
        assert_eq!(levels.value.as_ref().unwrap().text, "[1, 2.5]");
        assert_eq!(levels.quality.as_ref().unwrap().vendor, 3);

        assert_eq!(items[2].result_id.as_deref(), Some("E_UNKNOWNITEMNAME"));
        assert!(items[2].value.is_none());
        assert!(items[2].timestamp.is_zero());
        assert_eq!(reply.errors.len(), 1);
    }

    #[test]
    fn read_reply_without_item_list() {
        let reply = read_response(&envelope("<ReadResponse/>")).unwrap();
        assert!(reply.items.is_none());
        assert!(reply.result.is_none());

        let xml = envelope(r#"<ReadResponse><RItemList><Items><Quality VendorField="lots"/></Items></RItemList></ReadResponse>"#);
        assert!(matches!(read_response(&xml), Err(RpcError::Decode(_))));
    }
}
