//! Common test utilities for lifecycle integration tests.

#![allow(dead_code)]

use davprobe_server::{ServerConfig, ServerLifecycle};
use reqwest::{Client, Method, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A started lifecycle with its resource root (cleaned up on drop).
pub struct TestServer {
    pub lifecycle: ServerLifecycle,
    pub addr: SocketAddr,
    pub client: Client,
    _root: TempDir,
}

impl TestServer {
    /// Start a server with a fresh temporary root.
    pub async fn start(config: ServerConfig) -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let mut lifecycle = ServerLifecycle::new(root.path());
        let addr = lifecycle
            .start(&config)
            .await
            .expect("Failed to start server-under-test");

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            lifecycle,
            addr,
            client,
            _root: root,
        }
    }

    pub async fn with_defaults() -> Self {
        Self::start(ServerConfig::default()).await
    }

    /// Build a full URL from a path.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn propfind(&self, path: &str, depth: Option<&str>) -> Response {
        let mut req = self
            .client
            .request(Method::from_bytes(b"PROPFIND").unwrap(), self.url(path));
        if let Some(depth) = depth {
            req = req.header("Depth", depth);
        }
        req.send().await.expect("PROPFIND request failed")
    }
}

impl TestServer {
    pub async fn put(&self, path: &str, body: &'static str) -> Response {
        self.client
            .put(self.url(path))
            .body(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    pub async fn get_text(&self, path: &str) -> (reqwest::StatusCode, String) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        let status = resp.status();
        (status, resp.text().await.expect("Failed to read body"))
    }

    /// COPY or MOVE with an absolute Destination.
    pub async fn transfer(&self, method: &str, from: &str, to: &str, overwrite: bool) -> Response {
        self.client
            .request(Method::from_bytes(method.as_bytes()).unwrap(), self.url(from))
            .header("Destination", self.url(to))
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .header("Depth", "infinity")
            .send()
            .await
            .expect("Transfer request failed")
    }
}

/// Read from a raw socket until the head of one HTTP response arrives.
pub async fn read_response_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut chunk))
            .await
            .expect("Timed out reading response")
            .expect("Socket read failed");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Open a connection and send the head of a PUT that waits for
/// `100 Continue` before its body.
///
/// Returns once the server has read the head and asked for the body,
/// i.e. once the request is observably in flight.
pub async fn start_put_in_flight(addr: SocketAddr, path: &str, body_len: usize) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("Failed to connect");
    let head = format!(
        "PUT {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: {body_len}\r\nExpect: 100-continue\r\n\r\n"
    );
    stream.write_all(head.as_bytes()).await.expect("Failed to write request head");

    let interim = read_response_head(&mut stream).await;
    assert!(
        interim.starts_with("HTTP/1.1 100"),
        "Expected 100 Continue, got: {interim}"
    );
    stream
}
