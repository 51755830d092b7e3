//! GetStatus and transport failure tests over loopback HTTP.

use std::sync::Arc;
use std::time::Duration;

use opc_xmlda::net::{HttpExchanger, TransportError};
use opc_xmlda::observability::{MemorySink, ObservedLayer, TracePhase, ABANDONED};
use opc_xmlda::soap::{write_status, RpcError, SoapClient};
use tower::Layer;

mod common;

use common::{envelope, Recorded};

fn status_reply(request: &Recorded) -> (u16, String) {
    let body = format!(
        r#"<GetStatusResponse xmlns="http://opcfoundation.org/webservices/XMLDA/1.0/">
            <GetStatusResult RcvTime="2024-05-01T10:00:00Z" ReplyTime="2024-05-01T10:00:00.125Z" ClientRequestHandle="{}" ServerState="running"/>
            <Status StartTime="2024-04-30T08:00:00Z" ProductVersion="2.1">
                <VendorInfo>Acme OPC Server</VendorInfo>
                <SupportedLocaleIDs>en</SupportedLocaleIDs>
                <SupportedInterfaceVersions>XML_DA_Version_1_0</SupportedInterfaceVersions>
            </Status>
        </GetStatusResponse>"#,
        request.attr("ClientRequestHandle")
    );
    (200, envelope(&body))
}

#[tokio::test]
async fn status_report_lists_present_fields() {
    let (addr, log) = common::start_programmable_backend(status_reply).await;
    let client = SoapClient::new(
        format!("http://{addr}/opc").parse().unwrap(),
        HttpExchanger::new(Duration::from_secs(5)).unwrap(),
    )
    .with_request_timeout(Duration::from_secs(5));

    let reply = client.get_status("", "req-7").await.unwrap();
    let mut out = Vec::new();
    write_status(&reply, &mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "GetStatusResult:\n  ServerState: running\n  ClientRequestHandle: req-7\n  ReplyTime: 2024-05-01T10:00:00.125Z\n  ReceiveTime: 2024-05-01T10:00:00Z\nStatus:\n  VendorInfo: Acme OPC Server\n  ProductVersion: 2.1\n  StartTime: 2024-04-30T08:00:00Z\n  SupportedLocaleIDs: en\n  SupportedInterfaceVersions: XML_DA_Version_1_0\n"
    );

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].head.starts_with("post /opc http/1.1"));
    assert!(requests[0].head.contains("content-type: text/xml; charset=utf-8"));
    assert!(requests[0].body.contains("<GetStatus "));
}

#[tokio::test]
async fn soap_fault_becomes_rpc_fault() {
    let (addr, _log) = common::start_programmable_backend(|_: &Recorded| {
        let fault = envelope(
            "<soap:Fault><faultcode>soap:Server</faultcode><faultstring>E_SERVERSTATE</faultstring></soap:Fault>",
        );
        (500, fault)
    })
    .await;
    let sink = Arc::new(MemorySink::new());
    let transport = ObservedLayer::with_sink(1024, sink.clone())
        .layer(HttpExchanger::new(Duration::from_secs(5)).unwrap());
    let client = SoapClient::new(format!("http://{addr}/").parse().unwrap(), transport);

    let err = client.get_status("", "").await.unwrap_err();
    assert_eq!(err.to_string(), "soap fault soap:Server: E_SERVERSTATE");

    // An HTTP error status is still a completed exchange.
    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e.phase, TracePhase::Response { status: 500, .. })));
    assert!(!events.iter().any(|e| e.phase.name() == "http response error"));
}

#[tokio::test]
async fn bad_status_without_fault() {
    let (addr, _log) = common::start_programmable_backend(|_: &Recorded| (503, "busy".to_string())).await;
    let client = SoapClient::new(
        format!("http://{addr}/").parse().unwrap(),
        HttpExchanger::new(Duration::from_secs(5)).unwrap(),
    );

    let err = client.get_status("", "").await.unwrap_err();
    assert!(matches!(err, RpcError::Status { status: 503 }), "{err}");
}

#[tokio::test]
async fn connect_failure_passes_through_unchanged() {
    let addr = common::closed_port().await;
    let sink = Arc::new(MemorySink::new());
    let transport = ObservedLayer::with_sink(1024, sink.clone())
        .layer(HttpExchanger::new(Duration::from_secs(5)).unwrap());
    let client = SoapClient::new(format!("http://{addr}/").parse().unwrap(), transport);

    let err = client.get_status("", "").await.unwrap_err();
    assert!(
        matches!(err, RpcError::Transport(TransportError::Connect { .. })),
        "{err}"
    );

    let names: Vec<_> = sink.events().iter().map(|e| e.phase.name()).collect();
    assert_eq!(
        names,
        [
            "http request",
            "http trace dns start",
            "http trace dns done",
            "http trace connect start",
            "http trace connect done",
            "http response error",
        ]
    );
    let events = sink.events();
    assert!(matches!(
        &events[4].phase,
        TracePhase::ConnectDone { error: Some(_), network: "tcp", .. }
    ));
}

#[tokio::test]
async fn request_timeout_bounds_the_exchange() {
    let addr = common::start_silent_backend().await;
    let client = SoapClient::new(
        format!("http://{addr}/").parse().unwrap(),
        HttpExchanger::new(Duration::from_secs(5)).unwrap(),
    )
    .with_request_timeout(Duration::from_millis(200));

    let err = client.get_status("", "").await.unwrap_err();
    assert!(
        matches!(err, RpcError::Transport(TransportError::Timeout(d)) if d == Duration::from_millis(200)),
        "{err}"
    );
}

#[tokio::test]
async fn timed_out_exchange_still_ends_its_trace() {
    let addr = common::start_silent_backend().await;
    let sink = Arc::new(MemorySink::new());
    let transport = ObservedLayer::with_sink(1024, sink.clone())
        .layer(HttpExchanger::new(Duration::from_secs(5)).unwrap());
    let client = SoapClient::new(format!("http://{addr}/").parse().unwrap(), transport)
        .with_request_timeout(Duration::from_millis(200));

    let err = client.get_status("", "").await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(TransportError::Timeout(_))), "{err}");

    let events = sink.events();
    let names: Vec<_> = events.iter().map(|e| e.phase.name()).collect();
    assert_eq!(names.first(), Some(&"http request"));
    assert!(names.contains(&"http trace wrote request"), "{names:?}");
    assert_eq!(names.last(), Some(&"http response error"));
    assert!(matches!(
        &events[events.len() - 1].phase,
        TracePhase::ResponseError { error } if error == ABANDONED
    ));
}

#[tokio::test]
async fn failed_tls_handshake_is_traced_and_returned() {
    let addr = common::start_plaintext_backend().await;
    let sink = Arc::new(MemorySink::new());
    let transport = ObservedLayer::with_sink(1024, sink.clone())
        .layer(HttpExchanger::new(Duration::from_secs(5)).unwrap());
    let client = SoapClient::new(
        format!("https://127.0.0.1:{}/opc", addr.port()).parse().unwrap(),
        transport,
    );

    let err = client.get_status("", "").await.unwrap_err();
    assert!(
        matches!(&err, RpcError::Transport(TransportError::Tls { host, .. }) if host == "127.0.0.1"),
        "{err}"
    );

    let events = sink.events();
    let names: Vec<_> = events.iter().map(|e| e.phase.name()).collect();
    assert_eq!(
        names,
        [
            "http request",
            "http trace dns start",
            "http trace dns done",
            "http trace connect start",
            "http trace connect done",
            "http trace tls handshake start",
            "http trace tls handshake done",
            "http response error",
        ]
    );
    match &events[6].phase {
        TracePhase::TlsHandshakeDone {
            server_name,
            version,
            error,
            ..
        } => {
            assert_eq!(server_name, "127.0.0.1");
            assert!(version.is_none());
            assert!(error.is_some());
        }
        other => panic!("unexpected phase {other:?}"),
    }
    assert!(matches!(
        &events[7].phase,
        TracePhase::ResponseError { error } if *error == err.to_string()
    ));
}
