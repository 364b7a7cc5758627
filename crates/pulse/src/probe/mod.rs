//! Probe strategies.
//!
//! A descriptor is turned into a [`CheckPlan`] once, and the plan is dispatched
//! to exactly one strategy. Strategies are total: every failure becomes a
//! [`ProbeOutcome`] instead of an error.

mod command;
mod container;
mod http;
mod ping;
mod process;
mod tcp;

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

pub use command::CommandChecker;
pub use container::{ContainerChecker, ContainerStats, classify_inspect, parse_stats};
pub use http::HttpChecker;
pub use ping::{PingChecker, parse_latency};
pub use process::{Pm2Checker, ProcessChecker, ProcessStats, classify_pgrep, classify_pm2, parse_ps};
pub use tcp::{SshChecker, TcpChecker};

use crate::error::PulseError;
use crate::pool::BlockingPool;
use crate::resource::{AppConfig, AppKind, ResourceDescriptor, ServerCheck, ServerConfig, WebsiteConfig};
use crate::settings::MonitorSection;

const APP_TIMEOUT: u64 = 10;
const COMMAND_TIMEOUT: u64 = 30;
const PORT_TIMEOUT: u64 = 5;
const PING_WAIT: u64 = 3;

/// Checker trait for the different probe strategies
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    type Target: Send + Sync;

    /// Probe the target. Never fails; problems are reported in the outcome.
    async fn check(&self, target: &Self::Target) -> ProbeOutcome;
}

/// Normalized result of one probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub latency_ms: Option<f64>,
    pub message: String,
    pub details: BTreeMap<String, Value>,
    /// The target answered but not as configured
    pub soft_failure: bool,
    /// The probe could not reach a verdict (missing tool, incomplete configuration)
    pub inconclusive: bool,
}

impl ProbeOutcome {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self { healthy: true, message: message.into(), ..Default::default() }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self { healthy: false, message: message.into(), ..Default::default() }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self { healthy: false, soft_failure: true, message: message.into(), ..Default::default() }
    }

    pub fn inconclusive(message: impl Into<String>) -> Self {
        Self { healthy: false, inconclusive: true, message: message.into(), ..Default::default() }
    }

    pub fn with_latency(mut self, elapsed: Duration) -> Self {
        self.latency_ms = Some(round_ms(elapsed));
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: Option<f64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Milliseconds rounded to one decimal
pub(crate) fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10.0
}

/// Accepted HTTP answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    Exact(u16),
    /// Anything the server answers below 500
    BelowServerError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub url: String,
    pub method: String,
    pub expected: ExpectedStatus,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl HttpTarget {
    pub fn get(url: impl Into<String>, expected: ExpectedStatus, timeout: Duration) -> Self {
        Self { url: url.into(), method: "GET".into(), expected, timeout, headers: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingTarget {
    pub host: String,
    /// Reply wait handed to `ping -W`
    pub wait: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    pub command: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTarget {
    pub container: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTarget {
    /// pm2 process name or `pgrep -f` pattern
    pub identifier: String,
    pub timeout: Duration,
}

/// What to run for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckPlan {
    Http(HttpTarget),
    Tcp(TcpTarget),
    SshBanner(TcpTarget),
    Ping(PingTarget),
    Command(CommandTarget),
    Container(ContainerTarget),
    Pm2(ProcessTarget),
    Process(ProcessTarget),
    /// Nothing can be probed; the reason is reported as the result message
    Unsupported { reason: String },
}

fn secs(value: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(value.unwrap_or(default).max(1))
}

fn unsupported(reason: impl Into<String>) -> CheckPlan {
    CheckPlan::Unsupported { reason: reason.into() }
}

/// Build the health URL of an app from its endpoint and optional host/port
fn app_health_url(app: &AppConfig) -> Option<String> {
    let endpoint = app.health_endpoint.as_deref().filter(|endpoint| !endpoint.is_empty())?;
    if url::Url::parse(endpoint).is_ok() {
        return Some(endpoint.to_string());
    }

    let path = if endpoint.starts_with('/') { endpoint.to_string() } else { format!("/{endpoint}") };
    match (&app.host, app.port) {
        (Some(host), Some(port)) => Some(format!("http://{host}:{port}{path}")),
        (Some(host), None) => Some(format!("http://{host}{path}")),
        (None, Some(port)) => Some(format!("http://localhost:{port}{path}")),
        (None, None) => None,
    }
}

impl CheckPlan {
    pub fn for_website(website: &WebsiteConfig) -> Self {
        CheckPlan::Http(HttpTarget {
            url: website.url.clone(),
            method: website.method.clone(),
            expected: ExpectedStatus::Exact(website.expected_status),
            timeout: secs(Some(website.timeout), APP_TIMEOUT),
            headers: website.headers.clone(),
        })
    }

    pub fn for_app(app: &AppConfig) -> Self {
        match &app.kind {
            AppKind::Docker => CheckPlan::Container(ContainerTarget {
                container: if app.identifier.is_empty() { app.name.clone() } else { app.identifier.clone() },
                timeout: secs(app.timeout, APP_TIMEOUT),
            }),
            AppKind::Pm2 => CheckPlan::Pm2(ProcessTarget {
                identifier: if app.identifier.is_empty() { app.name.clone() } else { app.identifier.clone() },
                timeout: secs(app.timeout, APP_TIMEOUT),
            }),
            AppKind::Process if app.identifier.is_empty() => unsupported("No process pattern configured"),
            AppKind::Process => CheckPlan::Process(ProcessTarget {
                identifier: app.identifier.clone(),
                timeout: secs(app.timeout, APP_TIMEOUT),
            }),
            AppKind::Http => match app_health_url(app) {
                Some(url) => CheckPlan::Http(HttpTarget::get(
                    url,
                    ExpectedStatus::Exact(200),
                    secs(app.timeout, APP_TIMEOUT),
                )),
                None => unsupported("No health endpoint"),
            },
            AppKind::Port => match (&app.host, app.port) {
                (Some(host), Some(port)) => CheckPlan::Tcp(TcpTarget {
                    host: host.clone(),
                    port,
                    timeout: secs(app.timeout, PORT_TIMEOUT),
                }),
                _ => unsupported("No host/port configured"),
            },
            AppKind::Command => {
                let command = app.command.clone().unwrap_or_else(|| app.identifier.clone());
                CheckPlan::Command(CommandTarget { command, timeout: secs(app.timeout, COMMAND_TIMEOUT) })
            }
            AppKind::Other(kind) => unsupported(format!("Unsupported app type '{kind}'")),
        }
    }

    pub fn for_server(server: &ServerConfig) -> Self {
        match &server.check_type {
            ServerCheck::Ping => {
                CheckPlan::Ping(PingTarget { host: server.host.clone(), wait: secs(server.timeout, PING_WAIT) })
            }
            ServerCheck::Ssh => CheckPlan::SshBanner(TcpTarget {
                host: server.host.clone(),
                port: server.port,
                timeout: secs(server.timeout, PORT_TIMEOUT),
            }),
            ServerCheck::Http => {
                let url = server.http_endpoint.clone().unwrap_or_else(|| format!("http://{}", server.host));
                CheckPlan::Http(HttpTarget::get(
                    url,
                    ExpectedStatus::BelowServerError,
                    secs(server.timeout, APP_TIMEOUT),
                ))
            }
            ServerCheck::Port => CheckPlan::Tcp(TcpTarget {
                host: server.host.clone(),
                port: server.port,
                timeout: secs(server.timeout, PORT_TIMEOUT),
            }),
            ServerCheck::Other(kind) => unsupported(format!("Unsupported check type '{kind}'")),
        }
    }

    pub fn for_descriptor(descriptor: &ResourceDescriptor) -> Self {
        match descriptor {
            ResourceDescriptor::Website(website) => Self::for_website(website),
            ResourceDescriptor::App(app) => Self::for_app(app),
            ResourceDescriptor::Server(server) => Self::for_server(server),
        }
    }

    /// Time the strategy itself is allowed to take
    pub fn timeout(&self) -> Duration {
        match self {
            CheckPlan::Http(target) => target.timeout,
            CheckPlan::Tcp(target) => target.timeout,
            CheckPlan::SshBanner(target) => target.timeout + tcp::BANNER_TIMEOUT,
            CheckPlan::Ping(target) => target.wait + ping::EXIT_SLACK,
            CheckPlan::Command(target) => target.timeout,
            CheckPlan::Container(target) => target.timeout,
            CheckPlan::Pm2(target) | CheckPlan::Process(target) => target.timeout,
            CheckPlan::Unsupported { .. } => Duration::ZERO,
        }
    }

    /// Strategy runs a subprocess on the blocking pool
    pub fn is_pooled(&self) -> bool {
        matches!(
            self,
            CheckPlan::Ping(_) | CheckPlan::Command(_) | CheckPlan::Container(_) | CheckPlan::Pm2(_) | CheckPlan::Process(_)
        )
    }

    /// Short label used in logs and details
    pub fn label(&self) -> &'static str {
        match self {
            CheckPlan::Http(_) => "http",
            CheckPlan::Tcp(_) => "port",
            CheckPlan::SshBanner(_) => "ssh",
            CheckPlan::Ping(_) => "ping",
            CheckPlan::Command(_) => "command",
            CheckPlan::Container(_) => "docker",
            CheckPlan::Pm2(_) => "pm2",
            CheckPlan::Process(_) => "process",
            CheckPlan::Unsupported { .. } => "unsupported",
        }
    }
}

/// Every strategy, plus the backstop deadline applied around each run.
///
/// One set holds the process-wide HTTP client and blocking pool; share it
/// behind an `Arc` between checkers.
pub struct ProbeSet {
    http: HttpChecker,
    tcp: TcpChecker,
    ssh: SshChecker,
    ping: PingChecker,
    command: CommandChecker,
    container: ContainerChecker,
    pm2: Pm2Checker,
    process: ProcessChecker,
    grace: Duration,
}

impl ProbeSet {
    pub fn new(pool: BlockingPool, grace: Duration) -> Result<Self, PulseError> {
        let pool = pool.with_grace(grace);
        Ok(Self {
            http: HttpChecker::new()?,
            tcp: TcpChecker,
            ssh: SshChecker::default(),
            ping: PingChecker::new(pool.clone()),
            command: CommandChecker::new(pool.clone()),
            container: ContainerChecker::new(pool.clone()),
            pm2: Pm2Checker::new(pool.clone()),
            process: ProcessChecker::new(pool),
            grace,
        })
    }

    pub fn from_settings(monitor: &MonitorSection) -> Result<Self, PulseError> {
        Self::new(BlockingPool::new(monitor.worker_threads), monitor.probe_grace())
    }

    /// Run the strategy for `plan`, bounded by its timeout plus grace
    pub async fn run(&self, plan: &CheckPlan) -> ProbeOutcome {
        let budget = plan.timeout() + self.grace;

        let probe = async {
            match plan {
                CheckPlan::Http(target) => self.http.check(target).await,
                CheckPlan::Tcp(target) => self.tcp.check(target).await,
                CheckPlan::SshBanner(target) => self.ssh.check(target).await,
                CheckPlan::Ping(target) => self.ping.check(target).await,
                CheckPlan::Command(target) => self.command.check(target).await,
                CheckPlan::Container(target) => self.container.check(target).await,
                CheckPlan::Pm2(target) => self.pm2.check(target).await,
                CheckPlan::Process(target) => self.process.check(target).await,
                CheckPlan::Unsupported { reason } => ProbeOutcome::inconclusive(reason.clone()),
            }
        };

        // Pooled strategies start the same budget once they hold a slot
        if plan.is_pooled() {
            return probe.await;
        }

        match tokio::time::timeout(budget, probe).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(check = plan.label(), ?budget, "probe abandoned after deadline");
                ProbeOutcome::unhealthy(format!("Timeout after {:.1}s", budget.as_secs_f64()))
                    .with_detail("check", plan.label())
            }
        }
    }
}
