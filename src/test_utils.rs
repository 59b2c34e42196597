//! Test utilities shared by unit tests.
//!
//! Spins up throwaway HTTP servers on `127.0.0.1:0`. A plain HTTP proxy
//! receives an absolute-form `GET http://...` request, so the same mock
//! serves as a list source and as a proxy under test.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How a mock server answers every request
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        body: String,
        delay: Duration,
    },
    /// Accept the connection and never answer.
    Hang,
}

impl MockReply {
    pub fn ok(body: &str) -> Self {
        Self::Respond {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(body: &str, delay: Duration) -> Self {
        Self::Respond {
            status: 200,
            body: body.to_string(),
            delay,
        }
    }
}

/// Start a mock HTTP server and return its port
pub async fn spawn_mock_server(reply: MockReply) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            if let Ok((mut socket, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    match reply {
                        MockReply::Respond {
                            status,
                            body,
                            delay,
                        } => {
                            tokio::time::sleep(delay).await;
                            let response = format!(
                                "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                status,
                                if status == 200 { "OK" } else { "Error" },
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        MockReply::Hang => {
                            std::future::pending::<()>().await;
                            drop(socket);
                        }
                    }
                });
            }
        }
    });

    port
}

/// A port that refuses connections
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A 50-byte body resembling an IP echo service reply
pub const ECHO_BODY: &str = "{\n  \"origin\": \"203.0.113.77\", \"pad\": \"xxxxxxxxx\"\n}";
