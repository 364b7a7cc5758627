use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::HISTORY_WINDOW;
use crate::error::PulseError;
use crate::pool::BlockingPool;
use crate::probe::{CheckPlan, ProbeOutcome, ProbeSet};
use crate::resource::{AppConfig, ResourceKind, ServerConfig, WebsiteConfig};
use crate::settings::MonitorSection;

/// Status of a resource after one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
    Unknown,
    /// Placeholder shown before the first result arrives
    Checking,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Checking => write!(f, "checking"),
        }
    }
}

/// Map a probe outcome onto a status
pub fn classify(outcome: &ProbeOutcome) -> HealthStatus {
    if outcome.healthy {
        HealthStatus::Healthy
    } else if outcome.inconclusive {
        HealthStatus::Unknown
    } else if outcome.soft_failure {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Result of one probe cycle for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub name: String,
    #[serde(rename = "resource_type")]
    pub kind: ResourceKind,
    pub status: HealthStatus,
    pub response_time_ms: Option<f64>,
    pub message: String,
    pub details: BTreeMap<String, Value>,
    pub checked_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub uptime_percent: Option<f64>,
}

impl HealthResult {
    pub fn from_outcome(name: impl Into<String>, kind: ResourceKind, outcome: ProbeOutcome) -> Self {
        Self {
            name: name.into(),
            kind,
            status: classify(&outcome),
            response_time_ms: outcome.latency_ms,
            message: outcome.message,
            details: outcome.details,
            checked_at: Utc::now(),
            consecutive_failures: 0,
            uptime_percent: None,
        }
    }

    pub fn checking(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            status: HealthStatus::Checking,
            response_time_ms: None,
            message: "Checking...".to_string(),
            details: BTreeMap::new(),
            checked_at: Utc::now(),
            consecutive_failures: 0,
            uptime_percent: None,
        }
    }
}

/// Aggregate counts over a result set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub degraded: usize,
    pub unknown: usize,
    pub checking: usize,
    pub health_percent: f64,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a HealthResult>) -> Self {
        let mut summary = Summary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Unhealthy => summary.unhealthy += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Unknown => summary.unknown += 1,
                HealthStatus::Checking => summary.checking += 1,
            }
        }
        summary.health_percent = if summary.total == 0 {
            0.0
        } else {
            (summary.healthy as f64 / summary.total as f64 * 1000.0).round() / 10.0
        };
        summary
    }
}

/// Results of one full cycle, in resolution order per type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub websites: Vec<HealthResult>,
    pub apps: Vec<HealthResult>,
    pub servers: Vec<HealthResult>,
    pub finished_at: DateTime<Utc>,
}

impl CheckReport {
    pub fn empty() -> Self {
        Self { websites: Vec::new(), apps: Vec::new(), servers: Vec::new(), finished_at: Utc::now() }
    }

    pub fn results(&self, kind: ResourceKind) -> &[HealthResult] {
        match kind {
            ResourceKind::Website => &self.websites,
            ResourceKind::App => &self.apps,
            ResourceKind::Server => &self.servers,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HealthResult> {
        self.websites.iter().chain(&self.apps).chain(&self.servers)
    }

    pub fn len(&self) -> usize {
        self.websites.len() + self.apps.len() + self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(self.iter())
    }
}

type HistoryKey = (ResourceKind, String);

/// Runs probes concurrently and keeps the last report plus a rolling history
pub struct HealthChecker {
    probes: Arc<ProbeSet>,
    history: Mutex<HashMap<HistoryKey, VecDeque<HealthResult>>>,
    last: RwLock<Arc<CheckReport>>,
}

impl HealthChecker {
    pub fn new(pool: BlockingPool, grace: Duration) -> Result<Self, PulseError> {
        Ok(Self::with_probes(Arc::new(ProbeSet::new(pool, grace)?)))
    }

    pub fn from_settings(monitor: &MonitorSection) -> Result<Self, PulseError> {
        Ok(Self::with_probes(Arc::new(ProbeSet::from_settings(monitor)?)))
    }

    /// Own history and last report over strategies shared with other checkers
    pub fn with_probes(probes: Arc<ProbeSet>) -> Self {
        Self {
            probes,
            history: Mutex::new(HashMap::new()),
            last: RwLock::new(Arc::new(CheckReport::empty())),
        }
    }

    pub fn probes(&self) -> &Arc<ProbeSet> {
        &self.probes
    }

    /// Probe one resource. Panics inside a strategy become an Unknown result.
    async fn probe(&self, name: &str, kind: ResourceKind, plan: CheckPlan) -> HealthResult {
        let outcome = AssertUnwindSafe(self.probes.run(&plan))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| ProbeOutcome::inconclusive("Check failed: probe panicked"));

        let result = HealthResult::from_outcome(name, kind, outcome);
        debug!(%kind, resource = name, check = plan.label(), status = %result.status, "probe finished");
        result
    }

    /// Append to the rolling window and derive failure streak and uptime
    fn record(&self, result: &mut HealthResult) {
        let mut history = self.history.lock();
        let window = history.entry((result.kind, result.name.clone())).or_default();

        window.push_back(result.clone());
        while window.len() > HISTORY_WINDOW {
            window.pop_front();
        }

        let streak = window.iter().rev().take_while(|past| past.status == HealthStatus::Unhealthy).count();
        let healthy = window.iter().filter(|past| past.status == HealthStatus::Healthy).count();
        result.consecutive_failures = streak as u32;
        result.uptime_percent = Some(healthy as f64 / window.len() as f64 * 100.0);

        if let Some(latest) = window.back_mut() {
            latest.consecutive_failures = result.consecutive_failures;
            latest.uptime_percent = result.uptime_percent;
        }
    }

    pub async fn check_website(&self, website: &WebsiteConfig) -> HealthResult {
        let mut result = self.probe(&website.name, ResourceKind::Website, CheckPlan::for_website(website)).await;
        self.record(&mut result);
        result
    }

    pub async fn check_app(&self, app: &AppConfig) -> HealthResult {
        let mut result = self.probe(&app.name, ResourceKind::App, CheckPlan::for_app(app)).await;
        self.record(&mut result);
        result
    }

    pub async fn check_server(&self, server: &ServerConfig) -> HealthResult {
        let mut result = self.probe(&server.name, ResourceKind::Server, CheckPlan::for_server(server)).await;
        self.record(&mut result);
        result
    }

    /// Probe everything concurrently; output order matches input order per type
    pub async fn check_all(
        &self,
        websites: &[WebsiteConfig],
        apps: &[AppConfig],
        servers: &[ServerConfig],
    ) -> CheckReport {
        let website_probes = websites
            .iter()
            .map(|website| self.probe(&website.name, ResourceKind::Website, CheckPlan::for_website(website)));
        let app_probes = apps.iter().map(|app| self.probe(&app.name, ResourceKind::App, CheckPlan::for_app(app)));
        let server_probes =
            servers.iter().map(|server| self.probe(&server.name, ResourceKind::Server, CheckPlan::for_server(server)));

        let (mut websites, mut apps, mut servers) =
            tokio::join!(join_all(website_probes), join_all(app_probes), join_all(server_probes));

        for result in websites.iter_mut().chain(apps.iter_mut()).chain(servers.iter_mut()) {
            self.record(result);
        }

        let report = CheckReport { websites, apps, servers, finished_at: Utc::now() };
        self.forget_missing(&report);
        let summary = report.summary();
        info!(
            total = summary.total,
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            degraded = summary.degraded,
            unknown = summary.unknown,
            "check cycle finished"
        );

        *self.last.write() = Arc::new(report.clone());
        report
    }

    /// Drop history of resources that are no longer configured
    fn forget_missing(&self, report: &CheckReport) {
        let current: HashSet<(ResourceKind, &str)> =
            report.iter().map(|result| (result.kind, result.name.as_str())).collect();

        let mut history = self.history.lock();
        let before = history.len();
        history.retain(|(kind, name), _| current.contains(&(*kind, name.as_str())));
        if history.len() < before {
            debug!(dropped = before - history.len(), "forgot history of removed resources");
        }
    }

    /// Summary of the last completed cycle
    pub fn get_summary(&self) -> Summary {
        self.last.read().summary()
    }

    pub fn last_report(&self) -> Arc<CheckReport> {
        self.last.read().clone()
    }

    /// Up to `limit` most recent results for a resource, oldest first
    pub fn history(&self, kind: ResourceKind, name: &str, limit: usize) -> Vec<HealthResult> {
        let history = self.history.lock();
        match history.get(&(kind, name.to_string())) {
            Some(window) => window.iter().skip(window.len().saturating_sub(limit)).cloned().collect(),
            None => Vec::new(),
        }
    }
}
