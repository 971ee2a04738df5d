mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use tally_proxy::config::LimitsConfig;
use tally_proxy::http::read_response;
use tally_proxy::rpc::StatsClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::test]
async fn response_carries_running_byte_count() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let client = reqwest::Client::new();
    let res = client.get(proxy.proxy_url("/foo?n=50")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-bytes"], "50");
    assert_eq!(res.bytes().await.unwrap().len(), 50);

    let snapshot = StatsClient::new(&proxy.rpc_url()).status().await.unwrap();
    assert_eq!(snapshot.get("/foo"), Some(50));

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn keep_alive_connection_accumulates_per_path() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let stream = TcpStream::connect(proxy.proxy_addr).await.unwrap();
    let (r, mut w) = stream.into_split();
    let mut reader = BufReader::new(r);
    let limits = LimitsConfig::default();

    let mut headers = Vec::new();
    for target in ["/foo?n=50", "/foo?n=30", "/bar?n=7", "/foo?n=4&chunked"] {
        w.write_all(format!("GET {target} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let res = read_response(&mut reader, &Method::GET, &limits).await.unwrap();
        headers.push(res.headers["x-bytes"].to_str().unwrap().to_string());
    }
    assert_eq!(headers, ["50", "80", "7", "84"]);

    drop(w);
    drop(reader);
    proxy.stop().await;
}

#[tokio::test]
async fn chunked_backend_body_is_counted_decoded() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let client = reqwest::Client::new();
    let res = client
        .get(proxy.proxy_url("/chunky?n=21&chunked"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-bytes"], "21");
    assert_eq!(res.text().await.unwrap(), "b".repeat(21));

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn head_request_counts_declared_length() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let client = reqwest::Client::new();
    let res = client.head(proxy.proxy_url("/h?n=40")).send().await.unwrap();
    assert_eq!(res.headers()["x-bytes"], "40");
    assert_eq!(res.headers()["content-length"], "40");
    assert!(res.bytes().await.unwrap().is_empty());
    assert_eq!(proxy.stats.get("/h"), Some(40));

    // The body-less response left the connection usable.
    let res = client.get(proxy.proxy_url("/h?n=2")).send().await.unwrap();
    assert_eq!(res.headers()["x-bytes"], "42");

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn length_body_beyond_buffer_limit_reaches_client() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy_with(backend, |config| {
        config.limits.max_body_bytes = 1024;
    })
    .await;

    let res = reqwest::get(proxy.proxy_url("/big?n=300000")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-bytes"], "300000");
    assert_eq!(res.bytes().await.unwrap().len(), 300_000);
    assert_eq!(proxy.stats.get("/big"), Some(300_000));

    proxy.stop().await;
}

#[tokio::test]
async fn rpc_reports_empty_table_before_traffic() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let snapshot = StatsClient::new(&proxy.rpc_url()).status().await.unwrap();
    assert!(snapshot.is_empty());

    let raw: serde_json::Value = reqwest::get(format!("{}/stats", proxy.rpc_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw, serde_json::json!({ "request_bytes": {} }));

    proxy.stop().await;
}

#[tokio::test]
async fn unreachable_backend_closes_client_without_response() {
    let backend = common::dead_address().await;
    let proxy = common::start_proxy(backend).await;

    let mut stream = TcpStream::connect(proxy.proxy_addr).await.unwrap();
    stream.write_all(b"GET /foo HTTP/1.1\r\n\r\n").await.unwrap();

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .unwrap();
    assert!(read.is_ok());
    assert!(received.is_empty());

    let snapshot = StatsClient::new(&proxy.rpc_url()).status().await.unwrap();
    assert!(snapshot.is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn malformed_client_does_not_disturb_others() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let mut bad = TcpStream::connect(proxy.proxy_addr).await.unwrap();
    let client = reqwest::Client::new();

    bad.write_all(b"\x16\x03\x01 not http at all\r\n\r\n").await.unwrap();
    let res = client.get(proxy.proxy_url("/ok?n=3")).send().await.unwrap();
    assert_eq!(res.headers()["x-bytes"], "3");

    let mut received = Vec::new();
    let _ = bad.read_to_end(&mut received).await;
    assert!(received.is_empty());

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn concurrent_clients_sum_exactly() {
    let backend = common::start_backend().await;
    let proxy = common::start_proxy(backend).await;

    let done = Arc::new(AtomicBool::new(false));
    let poller = {
        let rpc = StatsClient::new(&proxy.rpc_url());
        let done = done.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while !done.load(Ordering::Acquire) {
                let snapshot = rpc.status().await.unwrap();
                seen.push(snapshot.get("/shared").unwrap_or(0));
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            seen
        })
    };

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let url = proxy.proxy_url("/shared?n=5");
            tokio::spawn(async move {
                let client = reqwest::Client::new();
                for _ in 0..5 {
                    let res = client.get(&url).send().await.unwrap();
                    res.bytes().await.unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    done.store(true, Ordering::Release);

    let seen = poller.await.unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "totals went backwards: {seen:?}");
    assert!(seen.iter().all(|total| total % 5 == 0), "torn total in {seen:?}");

    let last = StatsClient::new(&proxy.rpc_url()).status().await.unwrap();
    assert_eq!(last.get("/shared"), Some(16 * 5 * 5));
    assert_eq!(proxy.stats.get("/shared"), Some(16 * 5 * 5));
    proxy.stop().await;
}
