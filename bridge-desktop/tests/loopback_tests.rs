//! Adapters exercised against loopback servers.

use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, RetryPolicy};
use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest, NetworkMonitor};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answers every connection with the next canned response (the last one
/// repeats) and counts requests.
async fn serve(responses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let response = responses[n.min(responses.len() - 1)];

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buf[..read]),
                }
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), hits)
}

const OK_AUDIO: &str =
    "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: audio/mpeg\r\nConnection: close\r\n\r\nhello";
const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const UNAVAILABLE: &str =
    "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const ACCEPTED: &str = "HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

#[tokio::test]
async fn download_streams_the_body() {
    let (base, _) = serve(vec![OK_AUDIO]).await;
    let client = ReqwestHttpClient::new();

    let download = client.download(&format!("{}/a.mp3", base)).await.unwrap();
    assert_eq!(download.content_length, Some(5));

    let mut body = Vec::new();
    let mut stream = download.stream;
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn download_reports_status_errors() {
    let (base, _) = serve(vec![NOT_FOUND]).await;
    let client = ReqwestHttpClient::new();
    let url = format!("{}/missing.mp3", base);

    let error = client.download(&url).await.unwrap_err();
    assert_eq!(error, BridgeError::Status { status: 404, url });
}

#[tokio::test]
async fn execute_retries_server_errors() {
    let (base, hits) = serve(vec![UNAVAILABLE, ACCEPTED]).await;
    let client = ReqwestHttpClient::new().with_retry_policy(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    });

    let request = HttpRequest::new(HttpMethod::Post, format!("{}/events", base))
        .json(&serde_json::json!({ "events": [] }))
        .unwrap();
    let response = client.execute(request).await.unwrap();

    assert_eq!(response.status, 202);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn execute_without_retry_returns_the_failure_status() {
    let (base, hits) = serve(vec![UNAVAILABLE]).await;
    let client = ReqwestHttpClient::new().with_retry_policy(RetryPolicy::none());

    let response = client
        .execute(HttpRequest::new(HttpMethod::Post, format!("{}/events", base)))
        .await
        .unwrap();

    assert!(response.is_server_error());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn probe_reports_a_reachable_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { while listener.accept().await.is_ok() {} });

    let monitor = DesktopNetworkMonitor::with_probe(addr.to_string());
    let info = monitor.get_network_info().await.unwrap();

    assert!(info.is_online());
    assert!(info.rtt_ms.is_some());
    assert!(info.effective_type.is_some());
}

#[tokio::test]
async fn probe_reports_offline_when_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let monitor = DesktopNetworkMonitor::with_probe(addr.to_string())
        .with_probe_timeout(Duration::from_millis(200));

    assert!(!monitor.is_connected().await);
}
