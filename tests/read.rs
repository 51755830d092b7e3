//! Single item Read over loopback HTTP.

use std::time::Duration;

use opc_xmlda::net::HttpExchanger;
use opc_xmlda::soap::{write_read, ReadRequest, RpcError, SoapClient};

mod common;

use common::{envelope, Recorded};

fn read_reply(request: &Recorded) -> (u16, String) {
    let body = match request.attr("ItemName").as_str() {
        "Plant.Speed" => format!(
            r#"<ReadResponse xmlns="http://opcfoundation.org/webservices/XMLDA/1.0/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
                <ReadResult RcvTime="2024-05-01T10:00:00Z" ReplyTime="2024-05-01T10:00:00.250Z" ClientRequestHandle="{}" ServerState="running"/>
                <RItemList>
                    <Items ItemName="Plant.Speed" Timestamp="2024-05-01T09:59:58Z">
                        <Value xsi:type="xsd:double">1450.5</Value>
                        <Quality QualityField="good" LimitField="none"/>
                    </Items>
                </RItemList>
            </ReadResponse>"#,
            request.attr("ClientRequestHandle")
        ),
        other => format!(
            r#"<ReadResponse>
                <RItemList><Items ItemName="{other}" ResultID="E_UNKNOWNITEMNAME"/></RItemList>
                <Errors ID="E_UNKNOWNITEMNAME"><Text>item is not known</Text></Errors>
            </ReadResponse>"#
        ),
    };
    (200, envelope(&body))
}

fn client(addr: std::net::SocketAddr) -> SoapClient<HttpExchanger> {
    SoapClient::new(
        format!("http://{addr}/opc").parse().unwrap(),
        HttpExchanger::new(Duration::from_secs(5)).unwrap(),
    )
    .with_request_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn read_prints_value_and_quality() {
    let (addr, log) = common::start_programmable_backend(read_reply).await;
    let request = ReadRequest {
        locale: "en".into(),
        client_handle: "r-1".into(),
        item_path: String::new(),
        item_name: "Plant.Speed".into(),
    };

    let reply = client(addr).read(&request).await.unwrap();
    let mut out = Vec::new();
    write_read(&reply, &mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ReadResult:\n  ServerState: running\n  ClientRequestHandle: r-1\n  ReplyTime: 2024-05-01T10:00:00.250Z\n  ReceiveTime: 2024-05-01T10:00:00Z\nItems:\n  - Item\n    ItemName: Plant.Speed\n    Value: 1450.5 (xsd:double)\n    Timestamp: 2024-05-01T09:59:58Z\n    Quality: quality=good, limit=none\n"
    );

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .head
        .contains("soapaction: \"http://opcfoundation.org/webservices/xmlda/1.0/read\""));
    assert!(requests[0].body.contains("<Read "));
    assert_eq!(requests[0].attr("LocaleID"), "en");
    assert_eq!(requests[0].attr("ReturnItemTime"), "true");
}

#[tokio::test]
async fn unknown_item_errors_are_reported_not_raised() {
    let (addr, _log) = common::start_programmable_backend(read_reply).await;
    let request = ReadRequest {
        item_path: "Plant".into(),
        item_name: "Nope".into(),
        ..Default::default()
    };

    let reply = client(addr).read(&request).await.unwrap();
    let mut out = Vec::new();
    write_read(&reply, &mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Items:\n  - Item\n    ItemName: Nope\n    ResultID: E_UNKNOWNITEMNAME\nErrors: E_UNKNOWNITEMNAME: item is not known\n"
    );
}

#[tokio::test]
async fn read_without_item_sends_nothing() {
    let (addr, log) = common::start_programmable_backend(read_reply).await;

    let err = client(addr).read(&ReadRequest::default()).await.unwrap_err();
    assert!(matches!(err, RpcError::MissingItem), "{err}");
    assert!(log.lock().unwrap().is_empty());
}
