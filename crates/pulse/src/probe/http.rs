use std::error::Error as _;
use std::io;
use std::time::{Duration, Instant};

use reqwest::Method;

use super::{Checker, ExpectedStatus, HttpTarget, ProbeOutcome};
use crate::error::PulseError;

const ALLOWED_METHODS: [&str; 6] = ["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH"];

/// HTTP/HTTPS checker sharing one pooled client across probes
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self, PulseError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

fn parse_method(method: &str) -> Option<Method> {
    let method = method.to_ascii_uppercase();
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        return None;
    }
    Method::from_bytes(method.as_bytes()).ok()
}

fn refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = inner.source();
    }
    // hyper does not always expose the io error in the chain
    err.is_connect() && format!("{err:?}").to_ascii_lowercase().contains("refused")
}

fn transport_failure(err: &reqwest::Error, target: &HttpTarget) -> ProbeOutcome {
    let outcome = if err.is_timeout() {
        ProbeOutcome::unhealthy(format!("Timeout after {}s", target.timeout.as_secs()))
    } else if refused(err) {
        ProbeOutcome::unhealthy("Connection refused")
    } else if err.is_connect() {
        ProbeOutcome::unhealthy("Connection failed")
    } else {
        ProbeOutcome::unhealthy("Request failed")
    };
    outcome.with_detail("url", target.url.as_str()).with_detail("error", err.to_string())
}

/// Verdict for a received status code
pub(crate) fn classify_status(status: u16, expected: ExpectedStatus) -> ProbeOutcome {
    match expected {
        ExpectedStatus::Exact(code) if status == code => ProbeOutcome::healthy(format!("HTTP {status}")),
        ExpectedStatus::Exact(code) if status < 500 => {
            ProbeOutcome::degraded(format!("HTTP {status} (expected {code})"))
        }
        ExpectedStatus::Exact(code) => ProbeOutcome::unhealthy(format!("HTTP {status} (expected {code})")),
        ExpectedStatus::BelowServerError if status < 500 => ProbeOutcome::healthy(format!("HTTP {status}")),
        ExpectedStatus::BelowServerError => ProbeOutcome::unhealthy(format!("HTTP {status}")),
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    type Target = HttpTarget;

    async fn check(&self, target: &HttpTarget) -> ProbeOutcome {
        let Some(method) = parse_method(&target.method) else {
            return ProbeOutcome::inconclusive(format!("Unsupported HTTP method {}", target.method))
                .with_detail("url", target.url.as_str());
        };

        let mut request = self.client.request(method, &target.url).timeout(target.timeout);
        for (name, value) in &target.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        match request.send().await {
            Ok(response) => {
                let latency = start.elapsed();
                let status = response.status().as_u16();
                let mut outcome = classify_status(status, target.expected)
                    .with_latency(latency)
                    .with_detail("url", target.url.as_str())
                    .with_detail("status_code", status);
                if let Some(length) = response.content_length() {
                    outcome = outcome.with_detail("content_length", length);
                }
                outcome
            }
            Err(err) => transport_failure(&err, target),
        }
    }
}
