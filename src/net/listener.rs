//! Client-facing TCP listener.
//!
//! # Responsibilities
//! - Bind the proxy address
//! - Accept client connections
//! - Apply backpressure: at most `max_connections` sessions hold a slot

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limiter closed")]
    Closed,
}

/// A freshly accepted client connection and the slot it occupies.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub permit: ConnectionPermit,
}

/// TCP listener that stops accepting while every slot is taken.
pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_error = |source: io::Error| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| bind_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let inner = TcpListener::bind(addr).await.map_err(bind_error)?;

        tracing::info!(
            address = ?inner.local_addr().ok(),
            max_connections = config.max_connections,
            "Proxy listener bound"
        );

        Ok(Self {
            inner,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Wait for a free slot, then for the next connection.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(
            peer_addr = %peer_addr,
            free_slots = self.slots.available_permits(),
            "Accepted connection"
        );

        Ok(Accepted {
            stream,
            peer_addr,
            permit: ConnectionPermit { _slot: permit },
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One occupied connection slot; dropping it frees the slot, even when the
/// session task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bind_address: &str, max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: bind_address.into(),
            max_connections,
        }
    }

    #[tokio::test]
    async fn slot_is_held_until_permit_drops() {
        let listener = Listener::bind(&config("127.0.0.1:0", 2)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        assert_eq!(accepted.peer_addr.ip(), addr.ip());
        assert_eq!(listener.available_permits(), 1);

        drop(accepted);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.max_connections(), 2);
    }

    #[tokio::test]
    async fn full_listener_waits_for_a_slot() {
        let listener = Listener::bind(&config("127.0.0.1:0", 1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _a = TcpStream::connect(addr).await.unwrap();
        let _b = TcpStream::connect(addr).await.unwrap();
        let first = listener.accept().await.unwrap();

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), listener.accept()).await;
        assert!(blocked.is_err());

        drop(first);
        assert!(listener.accept().await.is_ok());
    }

    #[tokio::test]
    async fn unparsable_address_is_a_bind_error() {
        let err = Listener::bind(&config("not-an-address", 1)).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind { ref address, .. } if address == "not-an-address"));
    }
}
