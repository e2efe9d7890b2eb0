//! Integration tests for webhook delivery.
//!
//! Spins up a one-shot HTTP endpoint on a loopback port, posts a CSV through
//! `webhook::post_csv`, and asserts on the captured multipart request.

use indeed_csv_downloader::webhook::post_csv;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Accept one request, read it fully, respond with `status_line`, and hand
/// the raw request bytes back through the returned receiver.
async fn capture_once(status_line: &'static str) -> (String, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break request.len();
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = find_subslice(&request, b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let content_length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        while request.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response =
            format!("HTTP/1.1 {status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(request);
    });

    (format!("http://{addr}/webhook"), rx)
}

#[tokio::test]
async fn test_webhook_posts_csv_as_multipart_file_field() {
    let tmp = TempDir::new().unwrap();
    let csv_path = tmp.path().join("indeed-output.csv");
    std::fs::write(&csv_path, b"name,email\nalice,alice@example.com\n").unwrap();

    let (url, rx) = capture_once("200 OK").await;
    let http = reqwest::Client::new();

    assert!(post_csv(&http, &url, &csv_path).await);

    let request = rx.await.unwrap();
    let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
    assert!(text.starts_with("post /webhook"), "request line: {}", &text[..40.min(text.len())]);
    assert!(text.contains("content-type: multipart/form-data"));
    assert!(text.contains(r#"name="file""#));
    assert!(text.contains(r#"filename="indeed-output.csv""#));
    assert!(text.contains("content-type: text/csv"));
    assert!(text.contains("alice@example.com"));
}

#[tokio::test]
async fn test_webhook_non_2xx_is_failure() {
    let tmp = TempDir::new().unwrap();
    let csv_path = tmp.path().join("indeed-output.csv");
    std::fs::write(&csv_path, b"a,b\n1,2\n").unwrap();

    let (url, _rx) = capture_once("500 Internal Server Error").await;
    let http = reqwest::Client::new();

    assert!(!post_csv(&http, &url, &csv_path).await);
}

#[tokio::test]
async fn test_webhook_unreachable_endpoint_is_failure() {
    let tmp = TempDir::new().unwrap();
    let csv_path = tmp.path().join("indeed-output.csv");
    std::fs::write(&csv_path, b"a,b\n1,2\n").unwrap();

    // Grab a free port, then close the listener so connects are refused.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let http = reqwest::Client::new();
    assert!(!post_csv(&http, &format!("http://{addr}/webhook"), &csv_path).await);
}

#[tokio::test]
async fn test_webhook_missing_file_is_failure() {
    let tmp = TempDir::new().unwrap();
    let http = reqwest::Client::new();
    // No request is ever sent; the file read fails first.
    assert!(
        !post_csv(
            &http,
            "http://127.0.0.1:1/webhook",
            &tmp.path().join("absent.csv")
        )
        .await
    );
}
