//! A single connection to the backend.
//!
//! # Responsibilities
//! - Own the stream and its buffered read/write views
//! - Send one request and read the matching response, buffered or streamed
//! - Dial new streams through the `Connector` seam

use std::future::Future;

use tokio::io::{
    AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;

use crate::config::LimitsConfig;
use crate::http::body::relay_length;
use crate::http::{read_response_body, read_response_head, HttpError, RelayError, Request, Response};
use crate::net::ConnectionId;
use axum::http::Method;

/// Opens byte streams to the backend.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Address being dialed, for logs and errors.
    fn address(&self) -> &str;

    fn connect(&self) -> impl Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// Dials the backend over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(self.address.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// An exclusively-owned backend connection with buffered reader and writer.
pub struct BackendConnection<S> {
    id: ConnectionId,
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
}

impl<S> BackendConnection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id: ConnectionId::new(),
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serialize `request` onto the writer and flush.
    pub async fn send(&mut self, request: &Request) -> std::io::Result<()> {
        request.write_to(&mut self.writer).await
    }

    /// Read the head of the response to a request made with `method`.
    pub async fn receive_head(
        &mut self,
        method: &Method,
        limits: &LimitsConfig,
    ) -> Result<Response, HttpError> {
        read_response_head(&mut self.reader, method, limits).await
    }

    /// Buffer the body of `response`, bounded by `limits.max_body_bytes`.
    pub async fn receive_body(
        &mut self,
        response: &mut Response,
        limits: &LimitsConfig,
    ) -> Result<(), HttpError> {
        read_response_body(&mut self.reader, response, limits).await
    }

    /// Stream a `len`-byte body from the backend into `sink`.
    pub async fn relay_body<W>(&mut self, sink: &mut W, len: u64) -> Result<(), RelayError>
    where
        W: AsyncWrite + Unpin,
    {
        relay_length(&mut self.reader, sink, len).await
    }

    /// Shut down the write side and drop the stream.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.writer.shutdown().await
    }
}

impl<S> std::fmt::Debug for BackendConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
