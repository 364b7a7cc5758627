use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;

use super::{Checker, ProbeOutcome, TcpTarget};

pub(crate) const BANNER_TIMEOUT: Duration = Duration::from_secs(2);
const BANNER_LIMIT: usize = 256;

enum ConnectError {
    Dns(String),
    Timeout,
    Refused,
    Other(io::Error),
}

/// Resolve then connect, trying each address until the deadline
async fn connect(target: &TcpTarget) -> Result<TcpStream, ConnectError> {
    let deadline = Instant::now() + target.timeout;

    let addrs: Vec<SocketAddr> = match timeout(target.timeout, lookup_host((target.host.as_str(), target.port))).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(err)) => return Err(ConnectError::Dns(err.to_string())),
        Err(_) => return Err(ConnectError::Timeout),
    };
    if addrs.is_empty() {
        return Err(ConnectError::Dns(format!("no addresses for {}", target.host)));
    }

    let mut last = ConnectError::Timeout;
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ConnectError::Timeout);
        }
        match timeout(remaining, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => last = ConnectError::Refused,
            Ok(Err(err)) => last = ConnectError::Other(err),
            Err(_) => return Err(ConnectError::Timeout),
        }
    }
    Err(last)
}

fn connect_failure(err: ConnectError, target: &TcpTarget) -> ProbeOutcome {
    let outcome = match err {
        ConnectError::Dns(reason) => ProbeOutcome::unhealthy("DNS resolution failed").with_detail("error", reason),
        ConnectError::Timeout => ProbeOutcome::unhealthy("Connection timeout"),
        ConnectError::Refused => ProbeOutcome::unhealthy(format!("Port {} closed (connection refused)", target.port)),
        ConnectError::Other(err) => ProbeOutcome::unhealthy("Connection failed").with_detail("error", err.to_string()),
    };
    outcome.with_detail("host", target.host.as_str()).with_detail("port", target.port)
}

/// TCP port checker
pub struct TcpChecker;

#[async_trait::async_trait]
impl Checker for TcpChecker {
    type Target = TcpTarget;

    async fn check(&self, target: &TcpTarget) -> ProbeOutcome {
        let start = Instant::now();
        match connect(target).await {
            Ok(_stream) => ProbeOutcome::healthy(format!("Port {} open", target.port))
                .with_latency(start.elapsed())
                .with_detail("host", target.host.as_str())
                .with_detail("port", target.port),
            Err(err) => connect_failure(err, target),
        }
    }
}

/// SSH reachability: a TCP connect followed by reading the server banner
pub struct SshChecker {
    banner_timeout: Duration,
}

impl SshChecker {
    pub fn with_banner_timeout(banner_timeout: Duration) -> Self {
        Self { banner_timeout }
    }
}

impl Default for SshChecker {
    fn default() -> Self {
        Self { banner_timeout: BANNER_TIMEOUT }
    }
}

#[async_trait::async_trait]
impl Checker for SshChecker {
    type Target = TcpTarget;

    async fn check(&self, target: &TcpTarget) -> ProbeOutcome {
        let start = Instant::now();
        let mut stream = match connect(target).await {
            Ok(stream) => stream,
            Err(err) => return connect_failure(err, target).with_detail("check", "ssh"),
        };

        let mut buf = [0u8; BANNER_LIMIT];
        let banner = match timeout(self.banner_timeout, stream.read(&mut buf)).await {
            Ok(Ok(read)) if read > 0 => Some(String::from_utf8_lossy(&buf[..read]).trim().chars().take(50).collect::<String>()),
            _ => None,
        };
        let latency = start.elapsed();

        let outcome = match banner {
            Some(banner) => ProbeOutcome::healthy("SSH ready").with_detail("banner", banner),
            None => ProbeOutcome::degraded("Port open, no SSH banner"),
        };
        outcome
            .with_latency(latency)
            .with_detail("host", target.host.as_str())
            .with_detail("port", target.port)
            .with_detail("check", "ssh")
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    fn target(port: u16) -> TcpTarget {
        TcpTarget { host: "127.0.0.1".into(), port, timeout: Duration::from_secs(2) }
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = TcpChecker.check(&target(port)).await;
        assert!(outcome.healthy);
        assert!(outcome.latency_ms.is_some());
        assert_eq!(outcome.message, format!("Port {port} open"));
    }

    #[tokio::test]
    async fn test_closed_port() {
        let port = closed_port().await;

        let outcome = TcpChecker.check(&target(port)).await;
        assert!(!outcome.healthy);
        assert!(outcome.message.contains("refused"));
        assert!(outcome.latency_ms.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let outcome = TcpChecker
            .check(&TcpTarget { host: "opsmon.invalid".into(), port: 22, timeout: Duration::from_secs(3) })
            .await;
        assert!(!outcome.healthy);
        assert!(outcome.message == "DNS resolution failed" || outcome.message == "Connection timeout");
    }

    #[tokio::test]
    async fn test_ssh_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await.unwrap();
        });

        let outcome = SshChecker::default().check(&target(port)).await;
        assert!(outcome.healthy);
        assert_eq!(outcome.details["banner"], "SSH-2.0-OpenSSH_9.6");
    }

    #[tokio::test]
    async fn test_ssh_without_banner_is_soft_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(socket);
        });

        let outcome = SshChecker::with_banner_timeout(Duration::from_millis(200)).check(&target(port)).await;
        assert!(!outcome.healthy);
        assert!(outcome.soft_failure);
    }
}
