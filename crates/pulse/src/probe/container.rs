use std::time::Duration;

use tracing::debug;

use super::{Checker, ContainerTarget, ProbeOutcome};
use crate::exec::{ExecError, run_pooled};
use crate::pool::BlockingPool;

const INSPECT_FORMAT: &str = "{{.State.Status}}:{{if .State.Health}}{{.State.Health.Status}}{{else}}none{{end}}";
const STATS_FORMAT: &str = "{{.CPUPerc}}|{{.MemUsage}}|{{.MemPerc}}";
/// Below this much leftover budget resource usage is not collected
const STATS_MIN_BUDGET: Duration = Duration::from_millis(250);
const NOT_AVAILABLE: &str = "N/A";

/// Docker container state and health through `docker inspect`, usage through `docker stats`
pub struct ContainerChecker {
    pool: BlockingPool,
}

impl ContainerChecker {
    pub fn new(pool: BlockingPool) -> Self {
        Self { pool }
    }
}

/// Verdict for `<status>:<health>` as printed by the inspect format
pub fn classify_inspect(output: &str) -> ProbeOutcome {
    let (status, health) = output.trim().split_once(':').unwrap_or((output.trim(), "none"));
    let health = if health.is_empty() { "none" } else { health };

    let outcome = match (status, health) {
        ("running", "healthy" | "none") => ProbeOutcome::healthy(format!("Running ({health})")),
        ("running", "starting") => ProbeOutcome::degraded("Starting"),
        ("running", other) => ProbeOutcome::unhealthy(format!("Unhealthy: {other}")),
        (other, _) => ProbeOutcome::unhealthy(format!("Container {other}")),
    };
    outcome.with_detail("state", status).with_detail("health", health)
}

/// Resource usage printed by `docker stats --no-stream`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStats {
    pub cpu: String,
    pub memory: String,
    pub memory_percent: String,
}

/// Parse one `<cpu>|<mem usage>|<mem percent>` line
pub fn parse_stats(output: &str) -> Option<ContainerStats> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let mut fields = line.split('|').map(str::trim);
    let (cpu, memory, memory_percent) = (fields.next()?, fields.next()?, fields.next()?);
    if cpu.is_empty() || fields.next().is_some() {
        return None;
    }
    Some(ContainerStats { cpu: cpu.into(), memory: memory.into(), memory_percent: memory_percent.into() })
}

impl ContainerChecker {
    /// Best effort: any failure leaves the usage fields as `N/A`
    async fn stats(&self, container: &str, budget: Duration) -> Option<ContainerStats> {
        if budget < STATS_MIN_BUDGET {
            return None;
        }
        let argv = vec![
            "docker".to_string(),
            "stats".into(),
            "--no-stream".into(),
            "--format".into(),
            STATS_FORMAT.into(),
            container.to_string(),
        ];
        match run_pooled(&self.pool, argv, budget).await {
            Ok(output) if output.success() => parse_stats(&output.stdout),
            Ok(output) => {
                debug!(container, stderr = output.stderr.trim(), "docker stats failed");
                None
            }
            Err(err) => {
                debug!(container, error = %err, "docker stats failed");
                None
            }
        }
    }
}

fn with_stats(outcome: ProbeOutcome, stats: Option<ContainerStats>) -> ProbeOutcome {
    let stats = stats.unwrap_or_else(|| ContainerStats {
        cpu: NOT_AVAILABLE.into(),
        memory: NOT_AVAILABLE.into(),
        memory_percent: NOT_AVAILABLE.into(),
    });
    outcome
        .with_detail("cpu", stats.cpu)
        .with_detail("memory", stats.memory)
        .with_detail("memory_percent", stats.memory_percent)
}

#[async_trait::async_trait]
impl Checker for ContainerChecker {
    type Target = ContainerTarget;

    async fn check(&self, target: &ContainerTarget) -> ProbeOutcome {
        let argv = vec![
            "docker".to_string(),
            "inspect".into(),
            "--format".into(),
            INSPECT_FORMAT.into(),
            target.container.clone(),
        ];

        let outcome = match run_pooled(&self.pool, argv, target.timeout).await {
            Ok(output) if output.success() => {
                let outcome = classify_inspect(&output.stdout).with_latency(output.elapsed);
                let stats = self.stats(&target.container, target.timeout.saturating_sub(output.elapsed)).await;
                with_stats(outcome, stats)
            }
            Ok(output) => ProbeOutcome::unhealthy("Container not found").with_detail("error", output.stderr.trim()),
            Err(ExecError::NotFound(_)) => ProbeOutcome::inconclusive("Docker not installed"),
            Err(ExecError::Timeout(_)) => ProbeOutcome::unhealthy("Docker inspect timeout"),
            Err(err) => ProbeOutcome::inconclusive(format!("Error: {err}")),
        };
        outcome.with_detail("container", target.container.as_str()).with_detail("type", "docker")
    }
}
