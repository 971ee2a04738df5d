//! One client connection, one session.

use axum::http::HeaderValue;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf};

use crate::backend::{spawn_release, Connector, TcpConnector};
use crate::http::{read_request, Framing, RelayError, Request};
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::proxy::{ProxyContext, SessionError};

/// Whether the loop goes around again after an exchange.
enum Next {
    AwaitRequest,
    Terminate,
}

/// Drives sequential request/response exchanges for one client connection.
pub struct ProxySession<S, C: Connector = TcpConnector> {
    id: ConnectionId,
    client_reader: BufReader<ReadHalf<S>>,
    client_writer: BufWriter<WriteHalf<S>>,
    ctx: ProxyContext<C>,
}

impl<S, C> ProxySession<S, C>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    C: Connector,
{
    pub fn new(id: ConnectionId, client: S, ctx: ProxyContext<C>) -> Self {
        let (read_half, write_half) = tokio::io::split(client);
        Self {
            id,
            client_reader: BufReader::new(read_half),
            client_writer: BufWriter::new(write_half),
            ctx,
        }
    }

    /// Serve the connection until the client leaves or an error occurs, then
    /// close it. The client stream is closed exactly once, on every path.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.serve().await;

        match &result {
            Ok(()) => tracing::debug!(connection_id = %self.id, "Session finished"),
            Err(SessionError::ClientRead(e)) if e.is_disconnect() => {
                tracing::debug!(connection_id = %self.id, error = %e, "Client went away mid-request")
            }
            Err(e @ SessionError::Acquire(_)) => {
                tracing::error!(connection_id = %self.id, error = %e, "Session aborted")
            }
            Err(e) => tracing::warn!(connection_id = %self.id, error = %e, "Session aborted"),
        }
        if let Err(e) = &result {
            metrics::record_session_error(e.kind());
        }

        let _ = self.client_writer.shutdown().await;
        result
    }

    async fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            let request = match read_request(&mut self.client_reader, &self.ctx.limits).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(e) => return Err(SessionError::ClientRead(e)),
            };

            tracing::debug!(
                connection_id = %self.id,
                method = %request.method,
                path = %request.path(),
                "Proxying request"
            );

            match self.exchange(request).await? {
                Next::AwaitRequest => continue,
                Next::Terminate => return Ok(()),
            }
        }
    }

    /// AcquireBackend → Forward → AwaitResponse → update stats → RelayResponse.
    async fn exchange(&mut self, request: Request) -> Result<Next, SessionError> {
        let mut backend = self
            .ctx
            .pool
            .acquire()
            .await
            .map_err(SessionError::Acquire)?;

        if let Err(e) = backend.send(&request).await {
            self.ctx.pool.discard(backend);
            return Err(SessionError::BackendWrite(e));
        }

        let mut response = match backend.receive_head(&request.method, &self.ctx.limits).await {
            Ok(response) => response,
            Err(e) => {
                self.ctx.pool.discard(backend);
                return Err(SessionError::BackendRead(e));
            }
        };

        // Length-framed bodies are streamed after the head; anything else is
        // buffered so its size is known before the header is set.
        let streamed = match response.framing() {
            Framing::Length(len) => Some(len),
            _ => {
                if let Err(e) = backend.receive_body(&mut response, &self.ctx.limits).await {
                    self.ctx.pool.discard(backend);
                    return Err(SessionError::BackendRead(e));
                }
                None
            }
        };

        let bytes = response.byte_count(&request.method);
        let total = self.ctx.stats.update(request.path(), bytes);
        metrics::record_exchange(bytes);
        response.set_header(self.ctx.stats_header.clone(), HeaderValue::from(total));

        let relayed = match streamed {
            Some(len) => match response.write_head(&mut self.client_writer).await {
                Ok(()) => backend.relay_body(&mut self.client_writer, len).await,
                Err(e) => Err(RelayError::Sink(e)),
            },
            None => response
                .write_to(&mut self.client_writer)
                .await
                .map_err(RelayError::Sink),
        };

        tracing::debug!(
            connection_id = %self.id,
            backend_connection = %backend.id(),
            status = response.status.as_u16(),
            bytes,
            total,
            streamed = streamed.is_some(),
            "Relayed response"
        );

        // A buffered exchange leaves the backend clean even if the client
        // write failed. A streamed body left unfinished does not.
        if response.keeps_alive() && (relayed.is_ok() || streamed.is_none()) {
            spawn_release(self.ctx.pool.clone(), backend);
        } else {
            self.ctx.pool.discard(backend);
        }

        match relayed {
            Ok(()) => {}
            Err(RelayError::Source(e)) => return Err(SessionError::BackendRead(e)),
            Err(RelayError::Sink(e)) => return Err(SessionError::ClientWrite(e)),
        }

        if request.wants_close() || !response.keeps_alive() {
            Ok(Next::Terminate)
        } else {
            Ok(Next::AwaitRequest)
        }
    }
}
