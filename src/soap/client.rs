//! SOAP client over any exchanger.
//!
//! # Responsibilities
//! - Post envelopes with the operation's `SOAPAction`
//! - Attach basic auth when configured
//! - Bound each exchange, body included, by the request timeout
//! - Turn faults and bad statuses into [`RpcError`]
//!
//! # Design Decisions
//! - Generic over the exchanger so tracing is a layer, not a mode
//! - Replies are buffered; they are small and decoded as a whole

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, Uri};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tower::{Service, ServiceExt};

use crate::browse::{BrowsePage, BrowseRequest, BrowseService};
use crate::net::error::{BoxError, TransportError};
use crate::security::basic_auth;
use crate::soap::decode;
use crate::soap::envelope::{self, soap_action};
use crate::soap::error::RpcError;
use crate::soap::read::{ReadReply, ReadRequest};
use crate::soap::status::StatusReply;

/// OPC XML-DA client bound to one endpoint.
#[derive(Clone)]
pub struct SoapClient<S> {
    endpoint: Uri,
    transport: S,
    request_timeout: Duration,
    authorization: Option<HeaderValue>,
}

impl<S> SoapClient<S> {
    pub fn new(endpoint: Uri, transport: S) -> Self {
        Self {
            endpoint,
            transport,
            request_timeout: Duration::ZERO,
            authorization: None,
        }
    }

    /// Per-exchange timeout. Zero disables it.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Result<Self, RpcError> {
        let value = basic_auth(username, password).map_err(http::Error::from)?;
        self.authorization = Some(value);
        Ok(self)
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

impl<S, RB> SoapClient<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<RB>, Error = TransportError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
    RB: Body<Data = Bytes> + Send,
    RB::Error: Into<BoxError>,
{
    /// Fetch one browse page.
    pub async fn browse_page(&self, request: &BrowseRequest) -> Result<BrowsePage, RpcError> {
        let reply = self.call("Browse", envelope::browse(request)).await?;
        decode::browse_response(&reply)
    }

    /// Ask the server for its status.
    pub async fn get_status(&self, locale: &str, client_handle: &str) -> Result<StatusReply, RpcError> {
        let reply = self
            .call("GetStatus", envelope::get_status(locale, client_handle))
            .await?;
        decode::get_status_response(&reply)
    }

    /// Read the current value of one item.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadReply, RpcError> {
        if !request.names_item() {
            return Err(RpcError::MissingItem);
        }
        let reply = self.call("Read", envelope::read(request)).await?;
        decode::read_response(&reply)
    }

    async fn call(&self, operation: &str, envelope: String) -> Result<String, RpcError> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", soap_action(operation))
            .body(Full::new(Bytes::from(envelope)))?;
        if let Some(auth) = &self.authorization {
            request.headers_mut().insert(AUTHORIZATION, auth.clone());
        }

        let exchange = async {
            let response = self.transport.clone().oneshot(request).await?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Body(e.into()))?
                .to_bytes();
            Ok::<_, TransportError>((parts.status, body))
        };
        let (status, body) = if self.request_timeout.is_zero() {
            exchange.await?
        } else {
            tokio::time::timeout(self.request_timeout, exchange)
                .await
                .map_err(|_| TransportError::Timeout(self.request_timeout))??
        };

        let text = String::from_utf8_lossy(&body).into_owned();
        tracing::debug!(operation, status = status.as_u16(), bytes = body.len(), "soap reply");

        if !status.is_success() {
            // SOAP 1.1 faults travel with 500; prefer the fault text when present.
            return Err(match decode::body_payload(&text) {
                Err(fault @ RpcError::Fault { .. }) => fault,
                _ => RpcError::Status {
                    status: status.as_u16(),
                },
            });
        }
        Ok(text)
    }
}

impl<S, RB> BrowseService for SoapClient<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<RB>, Error = TransportError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
    RB: Body<Data = Bytes> + Send,
    RB::Error: Into<BoxError>,
{
    fn browse(&self, request: BrowseRequest) -> impl Future<Output = Result<BrowsePage, RpcError>> + Send {
        async move { self.browse_page(&request).await }
    }
}
