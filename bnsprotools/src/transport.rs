//! PTSL wire messages and transports
//!
//! Pro Tools exposes a single gRPC method, `ptsl.PTSL/SendGrpcRequest`,
//! whose request and response carry a small header plus JSON-encoded
//! bodies. The messages below mirror the fields of the PTSL proto the
//! client actually uses; unknown fields sent by newer Pro Tools builds are
//! skipped by prost.
//!
//! [`PtslTransport`] is the seam between the client logic and the wire:
//! [`GrpcTransport`] talks to a running Pro Tools, tests plug an in-memory
//! implementation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

/// gRPC path of the only PTSL method
pub const SEND_GRPC_REQUEST_PATH: &str = "/ptsl.PTSL/SendGrpcRequest";

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestHeader {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(int32, tag = "2")]
    pub command: i32,
    #[prost(int32, tag = "3")]
    pub version: i32,
    #[prost(string, tag = "4")]
    pub session_id: String,
    #[prost(int32, tag = "5")]
    pub version_minor: i32,
    #[prost(int32, tag = "6")]
    pub version_revision: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(message, optional, tag = "1")]
    pub header: Option<RequestHeader>,
    #[prost(string, tag = "2")]
    pub request_body_json: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseHeader {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(int32, tag = "2")]
    pub command: i32,
    #[prost(int32, tag = "3")]
    pub status: i32,
    #[prost(int32, tag = "4")]
    pub progress: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(message, optional, tag = "1")]
    pub header: Option<ResponseHeader>,
    #[prost(string, tag = "2")]
    pub response_body_json: String,
    #[prost(string, tag = "3")]
    pub response_error_json: String,
}

impl Request {
    /// Command identifier carried by the header (0 when absent)
    pub fn command(&self) -> i32 {
        self.header.as_ref().map(|h| h.command).unwrap_or_default()
    }

    /// Session identifier carried by the header (empty when absent)
    pub fn session_id(&self) -> &str {
        self.header.as_ref().map(|h| h.session_id.as_str()).unwrap_or("")
    }
}

impl Response {
    /// Status reported by Pro Tools (0 when the header is missing)
    pub fn status(&self) -> i32 {
        self.header.as_ref().map(|h| h.status).unwrap_or_default()
    }
}

/// A channel able to carry PTSL requests
#[async_trait]
pub trait PtslTransport: Send {
    /// Sends one request and waits for its response
    async fn send(&mut self, request: Request) -> Result<Response>;

    /// Releases the underlying channel. Must be idempotent.
    fn close(&mut self) {}
}

/// PTSL transport over a tonic gRPC channel
pub struct GrpcTransport {
    address: String,
    inner: Option<tonic::client::Grpc<Channel>>,
}

impl GrpcTransport {
    /// Opens a plaintext HTTP/2 channel to `host:port`
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let address = format!("http://{}:{}", host, port);

        let endpoint = Endpoint::from_shared(address.clone())
            .map_err(|e| Error::Connection {
                address: address.clone(),
                message: e.to_string(),
            })?
            .connect_timeout(connect_timeout);

        let channel = endpoint.connect().await.map_err(|e| Error::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;

        debug!(%address, "gRPC channel established");

        Ok(Self {
            address,
            inner: Some(tonic::client::Grpc::new(channel)),
        })
    }

    /// Address the channel was opened on
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl PtslTransport for GrpcTransport {
    async fn send(&mut self, request: Request) -> Result<Response> {
        let grpc = self.inner.as_mut().ok_or(Error::NotConnected)?;

        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e)))?;

        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(SEND_GRPC_REQUEST_PATH);
        let response = grpc.unary(tonic::Request::new(request), path, codec).await?;

        Ok(response.into_inner())
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(address = %self.address, "gRPC channel closed");
        }
    }
}
