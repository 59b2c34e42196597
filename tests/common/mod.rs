#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A 50-byte body resembling an IP echo service reply
pub const ECHO_BODY: &str = "{\n  \"origin\": \"203.0.113.77\", \"pad\": \"xxxxxxxxx\"\n}";

/// A running mock server
pub struct MockServer {
    pub port: u16,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    /// Responses fully written, or connections accepted for a hanging server
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve `body` with `status` after `delay` on every connection; `None`
/// accepts and never answers.
pub async fn start_mock(reply: Option<(u16, &str, Duration)>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reply = reply.map(|(status, body, delay)| (status, body.to_string(), delay));
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            if let Ok((mut socket, _)) = listener.accept().await {
                let reply = reply.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let Some((status, body, delay)) = reply else {
                        counter.fetch_add(1, Ordering::SeqCst);
                        std::future::pending::<()>().await;
                        return;
                    };
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
    });

    MockServer { port, hits }
}

pub async fn spawn_mock(reply: Option<(u16, &str, Duration)>) -> u16 {
    start_mock(reply).await.port
}

pub async fn spawn_working_proxy(delay: Duration) -> u16 {
    spawn_mock(Some((200, ECHO_BODY, delay))).await
}

/// Poll `condition` every 10ms until it holds or `limit` passes
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
