use super::{Checker, CommandTarget, ProbeOutcome};
use crate::exec::{ExecError, run_pooled, tokenize};
use crate::pool::BlockingPool;

const STDERR_LIMIT: usize = 100;

/// Runs a configured command; exit code 0 means healthy
pub struct CommandChecker {
    pool: BlockingPool,
}

impl CommandChecker {
    pub fn new(pool: BlockingPool) -> Self {
        Self { pool }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.trim().chars().take(limit).collect()
}

#[async_trait::async_trait]
impl Checker for CommandChecker {
    type Target = CommandTarget;

    async fn check(&self, target: &CommandTarget) -> ProbeOutcome {
        let argv = match tokenize(&target.command) {
            Ok(argv) => argv,
            Err(ExecError::Empty) => return ProbeOutcome::unhealthy("Empty command"),
            Err(err) => return ProbeOutcome::unhealthy(format!("Invalid command syntax: {err}")),
        };

        let outcome = match run_pooled(&self.pool, argv, target.timeout).await {
            Ok(output) if output.success() => ProbeOutcome::healthy("OK").with_latency(output.elapsed),
            Ok(output) => {
                let stderr = truncate(&output.stderr, STDERR_LIMIT);
                let message = match output.code {
                    _ if !stderr.is_empty() => stderr,
                    Some(code) => format!("Exit code: {code}"),
                    None => "Terminated by signal".to_string(),
                };
                let mut outcome = ProbeOutcome::unhealthy(message).with_latency(output.elapsed);
                if let Some(code) = output.code {
                    outcome = outcome.with_detail("exit_code", code);
                }
                outcome
            }
            Err(ExecError::NotFound(program)) => ProbeOutcome::unhealthy(format!("Command not found: {program}")),
            Err(ExecError::Timeout(_)) => {
                ProbeOutcome::unhealthy(format!("Command timeout after {}s", target.timeout.as_secs()))
            }
            Err(err) => ProbeOutcome::unhealthy(err.to_string()),
        };
        outcome.with_detail("command", target.command.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn target(command: &str, timeout: Duration) -> CommandTarget {
        CommandTarget { command: command.into(), timeout }
    }

    fn checker() -> CommandChecker {
        CommandChecker::new(BlockingPool::new(2))
    }

    #[tokio::test]
    async fn test_zero_exit_is_healthy() {
        let outcome = checker().check(&target("true", Duration::from_secs(5))).await;
        assert!(outcome.healthy);
        assert_eq!(outcome.message, "OK");
    }

    #[tokio::test]
    async fn test_failure_reports_truncated_stderr() {
        let long = "x".repeat(300);
        let command = format!("sh -c 'echo {long} >&2; exit 2'");

        let outcome = checker().check(&target(&command, Duration::from_secs(5))).await;
        assert!(!outcome.healthy);
        assert_eq!(outcome.message.len(), STDERR_LIMIT);
        assert_eq!(outcome.details["exit_code"], 2);
    }

    #[tokio::test]
    async fn test_failure_without_stderr_reports_exit_code() {
        let outcome = checker().check(&target("false", Duration::from_secs(5))).await;
        assert_eq!(outcome.message, "Exit code: 1");
    }

    #[tokio::test]
    async fn test_no_shell_interpretation() {
        // `;` is passed to echo as an argument, so this succeeds instead of running `false`
        let outcome = checker().check(&target("echo ok ; false", Duration::from_secs(5))).await;
        assert!(outcome.healthy);
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let checker = checker();
        assert_eq!(checker.check(&target("", Duration::from_secs(1))).await.message, "Empty command");
        assert!(checker.check(&target("echo 'open", Duration::from_secs(1))).await.message.starts_with("Invalid command syntax"));
        assert!(
            checker
                .check(&target("opsmon-no-such-tool --flag", Duration::from_secs(1)))
                .await
                .message
                .starts_with("Command not found")
        );
        assert_eq!(
            checker.check(&target("sleep 5", Duration::from_secs(1))).await.message,
            "Command timeout after 1s"
        );
    }
}
