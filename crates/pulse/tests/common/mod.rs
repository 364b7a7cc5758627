//! Local fixtures shared by the integration suites

#![allow(dead_code)]

use std::time::Duration;

use pulse::{BlockingPool, HealthChecker};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn checker() -> HealthChecker {
    let _ = tracing_subscriber::fmt::try_init();
    HealthChecker::new(BlockingPool::new(4), Duration::from_millis(500)).unwrap()
}

/// Minimal HTTP server answering every request with `status` after `delay`.
/// Returns the base URL.
pub async fn http_server(status: u16, delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let response =
                    format!("HTTP/1.1 {status} Fixture\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}

/// Accepts connections and never answers
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/")
}
