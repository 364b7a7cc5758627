use std::time::Duration;

use super::{Checker, PingTarget, ProbeOutcome};
use crate::exec::{ExecError, run_pooled};
use crate::pool::BlockingPool;

/// Extra time `ping` gets to exit after its reply wait
pub(crate) const EXIT_SLACK: Duration = Duration::from_secs(2);

/// ICMP reachability through the system `ping` binary
pub struct PingChecker {
    pool: BlockingPool,
}

impl PingChecker {
    pub fn new(pool: BlockingPool) -> Self {
        Self { pool }
    }
}

/// Round trip in ms from the `time=` field of ping output
pub fn parse_latency(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("time=")?;
        let value = rest.split_whitespace().next()?;
        value.trim_end_matches("ms").parse().ok()
    })
}

#[async_trait::async_trait]
impl Checker for PingChecker {
    type Target = PingTarget;

    async fn check(&self, target: &PingTarget) -> ProbeOutcome {
        let wait = target.wait.as_secs().max(1).to_string();
        let argv = vec!["ping".to_string(), "-c".into(), "1".into(), "-W".into(), wait, target.host.clone()];

        let outcome = match run_pooled(&self.pool, argv, target.wait + EXIT_SLACK).await {
            Ok(output) if output.success() => {
                ProbeOutcome::healthy("Reachable").with_latency_ms(parse_latency(&output.stdout))
            }
            Ok(_) => ProbeOutcome::unhealthy("Unreachable"),
            Err(ExecError::Timeout(_)) => ProbeOutcome::unhealthy("Timeout"),
            Err(ExecError::NotFound(_)) => ProbeOutcome::inconclusive("ping not installed"),
            Err(err) => ProbeOutcome::inconclusive(format!("Error: {err}")),
        };
        outcome.with_detail("host", target.host.as_str()).with_detail("check", "ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latency() {
        let linux = "PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.\n\
                     64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms\n";
        assert_eq!(parse_latency(linux), Some(0.045));

        let bsd = "64 bytes from 10.0.0.1: icmp_seq=0 ttl=64 time=12.3ms";
        assert_eq!(parse_latency(bsd), Some(12.3));

        assert_eq!(parse_latency("1 packets transmitted, 0 received"), None);
    }
}
