//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tally_proxy::config::{LimitsConfig, ProxyConfig};
use tally_proxy::http::read_request;
use tally_proxy::{App, Shutdown, StatsTable};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a keep-alive backend on a free loopback port.
///
/// The response body length comes from the `n` query parameter (default 0),
/// so `/foo?n=50` answers with 50 bytes while still counting against `/foo`.
/// A `chunked` parameter switches the response to chunked encoding.
pub async fn start_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (r, mut w) = socket.into_split();
                let mut reader = BufReader::new(r);
                let limits = LimitsConfig::default();
                while let Ok(Some(req)) = read_request(&mut reader, &limits).await {
                    let query = req.uri.query().unwrap_or("");
                    let n = query
                        .split('&')
                        .find_map(|kv| kv.strip_prefix("n="))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    let body = "b".repeat(n);
                    let chunked = query.split('&').any(|kv| kv == "chunked");

                    let raw = if chunked {
                        let (a, b) = body.split_at(n / 2);
                        let mut raw = String::from("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
                        for chunk in [a, b].into_iter().filter(|c| !c.is_empty()) {
                            raw.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
                        }
                        raw.push_str("0\r\n\r\n");
                        raw
                    } else {
                        format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}", n, body)
                    };
                    // HEAD responses keep the framing headers but carry no body.
                    let raw = if req.method == "HEAD" {
                        format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", n)
                    } else {
                        raw
                    };
                    if w.write_all(raw.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    addr
}

/// A loopback port with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct TestProxy {
    pub proxy_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub stats: Arc<StatsTable>,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestProxy {
    pub fn rpc_url(&self) -> String {
        format!("http://{}", self.rpc_addr)
    }

    pub fn proxy_url(&self, path: &str) -> String {
        format!("http://{}{}", self.proxy_addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

/// Start the proxy and RPC on free loopback ports, forwarding to `backend`.
pub async fn start_proxy(backend: SocketAddr) -> TestProxy {
    start_proxy_with(backend, |_| {}).await
}

/// Like `start_proxy`, with a hook to adjust the config before binding.
pub async fn start_proxy_with(
    backend: SocketAddr,
    configure: impl FnOnce(&mut ProxyConfig),
) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.rpc.bind_address = "127.0.0.1:0".into();
    config.origin.enabled = false;
    config.backend.address = backend.to_string();
    config.pool.acquire_timeout_ms = 20;
    configure(&mut config);

    let app = App::bind(&config).await.unwrap();
    let proxy_addr = app.proxy_addr().unwrap();
    let rpc_addr = app.rpc_addr().unwrap();
    let stats = app.stats().clone();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = app.run(&shutdown).await;
        })
    };

    TestProxy {
        proxy_addr,
        rpc_addr,
        stats,
        shutdown,
        handle,
    }
}
