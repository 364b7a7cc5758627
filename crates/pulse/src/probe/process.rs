use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{Checker, ProbeOutcome, ProcessTarget};
use crate::exec::{ExecError, run_pooled};
use crate::pool::BlockingPool;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// pm2-managed process looked up by name in `pm2 jlist`
pub struct Pm2Checker {
    pool: BlockingPool,
}

impl Pm2Checker {
    pub fn new(pool: BlockingPool) -> Self {
        Self { pool }
    }
}

/// Verdict for `identifier` in the JSON printed by `pm2 jlist`
pub fn classify_pm2(jlist: &str, identifier: &str) -> ProbeOutcome {
    let processes: Vec<Value> = match serde_json::from_str(jlist) {
        Ok(processes) => processes,
        Err(err) => return ProbeOutcome::inconclusive("Unreadable pm2 output").with_detail("error", err.to_string()),
    };

    let Some(process) = processes.iter().find(|process| process["name"].as_str() == Some(identifier)) else {
        return ProbeOutcome::unhealthy("Process not found");
    };

    let env = &process["pm2_env"];
    let status = env["status"].as_str().unwrap_or("unknown");
    let outcome = match status {
        "online" => ProbeOutcome::healthy("Online"),
        "stopping" | "launching" => ProbeOutcome::degraded(capitalize(status)),
        other => ProbeOutcome::unhealthy(capitalize(other)),
    };

    let memory_mb = process["monit"]["memory"].as_u64().unwrap_or(0) / (1024 * 1024);
    outcome
        .with_detail("restarts", env["restart_time"].as_u64().unwrap_or(0))
        .with_detail("pid", process["pid"].clone())
        .with_detail("cpu", format!("{}%", process["monit"]["cpu"].as_f64().unwrap_or(0.0)))
        .with_detail("memory", format!("{memory_mb}MB"))
}

#[async_trait::async_trait]
impl Checker for Pm2Checker {
    type Target = ProcessTarget;

    async fn check(&self, target: &ProcessTarget) -> ProbeOutcome {
        let argv = vec!["pm2".to_string(), "jlist".into()];

        let outcome = match run_pooled(&self.pool, argv, target.timeout).await {
            Ok(output) if output.success() => classify_pm2(&output.stdout, &target.identifier),
            Ok(output) => ProbeOutcome::inconclusive("pm2 error").with_detail("error", output.stderr.trim()),
            Err(ExecError::NotFound(_)) => ProbeOutcome::inconclusive("pm2 not installed"),
            Err(ExecError::Timeout(_)) => ProbeOutcome::unhealthy("pm2 timeout"),
            Err(err) => ProbeOutcome::inconclusive(format!("Error: {err}")),
        };
        outcome.with_detail("process", target.identifier.as_str()).with_detail("type", "pm2")
    }
}

/// System process matched with `pgrep -f`
pub struct ProcessChecker {
    pool: BlockingPool,
}

impl ProcessChecker {
    pub fn new(pool: BlockingPool) -> Self {
        Self { pool }
    }
}

/// Verdict for the pid list printed by `pgrep`
pub fn classify_pgrep(stdout: &str) -> ProbeOutcome {
    let pids: Vec<&str> = stdout.split_whitespace().collect();
    match pids.len() {
        0 => ProbeOutcome::unhealthy("Not running"),
        1 => ProbeOutcome::healthy("Running (1 instance)").with_detail("pids", pids),
        count => ProbeOutcome::healthy(format!("Running ({count} instances)")).with_detail("pids", pids),
    }
}

/// Usage of one process as printed by `ps -o %cpu=,%mem=,etime=`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    pub cpu: String,
    pub memory: String,
    /// Elapsed time since start, `[[dd-]hh:]mm:ss`
    pub uptime: String,
}

pub fn parse_ps(output: &str) -> Option<ProcessStats> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [cpu, memory, uptime] = fields.as_slice() else { return None };
    Some(ProcessStats { cpu: format!("{cpu}%"), memory: format!("{memory}%"), uptime: uptime.to_string() })
}

/// Below this much leftover budget `ps` is skipped
const STATS_MIN_BUDGET: Duration = Duration::from_millis(250);

impl ProcessChecker {
    /// Best effort usage of the first matched pid
    async fn stats(&self, pid: &str, budget: Duration) -> Option<ProcessStats> {
        if budget < STATS_MIN_BUDGET {
            return None;
        }
        let argv = vec!["ps".to_string(), "-p".into(), pid.to_string(), "-o".into(), "%cpu=,%mem=,etime=".into()];
        match run_pooled(&self.pool, argv, budget).await {
            Ok(output) if output.success() => parse_ps(&output.stdout),
            Ok(_) => None,
            Err(err) => {
                debug!(pid, error = %err, "ps failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl Checker for ProcessChecker {
    type Target = ProcessTarget;

    async fn check(&self, target: &ProcessTarget) -> ProbeOutcome {
        let argv = vec!["pgrep".to_string(), "-f".into(), target.identifier.clone()];

        // pgrep exits 1 when nothing matches, which the pid list already covers
        let outcome = match run_pooled(&self.pool, argv, target.timeout).await {
            Ok(output) if output.code.is_some_and(|code| code <= 1) => {
                let outcome = classify_pgrep(&output.stdout);
                let budget = target.timeout.saturating_sub(output.elapsed);
                match output.stdout.split_whitespace().next() {
                    Some(pid) => match self.stats(pid, budget).await {
                        Some(stats) => outcome
                            .with_detail("cpu", stats.cpu)
                            .with_detail("memory", stats.memory)
                            .with_detail("uptime", stats.uptime),
                        None => outcome,
                    },
                    None => outcome,
                }
            }
            Ok(output) => ProbeOutcome::inconclusive("pgrep error").with_detail("error", output.stderr.trim()),
            Err(ExecError::NotFound(_)) => ProbeOutcome::inconclusive("pgrep not installed"),
            Err(ExecError::Timeout(_)) => ProbeOutcome::unhealthy("pgrep timeout"),
            Err(err) => ProbeOutcome::inconclusive(format!("Error: {err}")),
        };
        outcome.with_detail("process", target.identifier.as_str()).with_detail("type", "process")
    }
}
