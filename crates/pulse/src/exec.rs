//! Child process execution with a hard deadline.
//!
//! Commands are tokenised with `shell-words` and spawned directly, never
//! through a shell. Runs are blocking and meant for [`BlockingPool`].

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::error::PulseError;
use crate::pool::BlockingPool;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Minimum time the pipes get to drain after the child exits
const DRAIN_MIN: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    Empty,
    #[error("invalid command syntax: {0}")]
    Syntax(String),
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("command timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("failed to run command: {0}")]
    Io(#[from] io::Error),
    #[error("worker unavailable: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Split a command line the way a POSIX shell would, without running one
pub fn tokenize(command: &str) -> Result<Vec<String>, ExecError> {
    let argv = shell_words::split(command).map_err(|err| ExecError::Syntax(err.to_string()))?;
    if argv.is_empty() {
        return Err(ExecError::Empty);
    }
    Ok(argv)
}

/// Bytes read from one pipe so far
type Sink = Arc<Mutex<Vec<u8>>>;

/// Read `pipe` on its own thread, signalling `done` at EOF.
///
/// The buffer fills incrementally so a reader that never reaches EOF (a
/// background grandchild holding the pipe) still leaves its output behind.
fn drain<R: Read + Send + 'static>(pipe: Option<R>, done: Sender<()>) -> Sink {
    let sink = Sink::default();
    let Some(mut pipe) = pipe else {
        let _ = done.send(());
        return sink;
    };

    let buf = sink.clone();
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => buf.lock().extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done.send(());
    });
    sink
}

fn collect(sink: &Sink) -> String {
    String::from_utf8_lossy(&sink.lock()).into_owned()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Run `argv` and wait at most `timeout` for it to exit.
///
/// The child is killed once the deadline passes.
pub fn run_with_timeout(argv: &[String], timeout: Duration) -> Result<CommandOutput, ExecError> {
    let (program, args) = argv.split_first().ok_or(ExecError::Empty)?;
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ExecError::NotFound(program.clone()),
            _ => ExecError::Io(err),
        })?;

    let (done_tx, done) = mpsc::channel();
    let stdout = drain(child.stdout.take(), done_tx.clone());
    let stderr = drain(child.stderr.take(), done_tx);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                kill(&mut child);
                return Err(ExecError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                kill(&mut child);
                return Err(ExecError::Io(err));
            }
        }
    };

    let elapsed = start.elapsed();

    // Readers get whatever is left of the deadline; pipes still held open by
    // a detached grandchild are abandoned with the output read so far.
    let drain_until = (start + timeout).max(Instant::now() + DRAIN_MIN);
    for _ in 0..2 {
        let remaining = drain_until.saturating_duration_since(Instant::now());
        if done.recv_timeout(remaining).is_err() {
            debug!(program = %program, "output pipes still open after exit");
            break;
        }
    }

    Ok(CommandOutput { code: status.code(), stdout: collect(&stdout), stderr: collect(&stderr), elapsed })
}

/// [`run_with_timeout`] on the blocking pool.
///
/// The deadline starts once a slot is held, so time spent queuing behind
/// other commands never counts against `timeout`.
pub async fn run_pooled(pool: &BlockingPool, argv: Vec<String>, timeout: Duration) -> Result<CommandOutput, ExecError> {
    match pool.run_within(timeout, move || run_with_timeout(&argv, timeout)).await {
        Ok(result) => result,
        Err(PulseError::Deadline(_)) => Err(ExecError::Timeout(timeout)),
        Err(err) => Err(ExecError::Worker(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(tokenize("curl -fsS 'http://a b'").unwrap(), argv(&["curl", "-fsS", "http://a b"]));
    }

    #[test]
    fn test_tokenize_rejects_empty_and_unbalanced() {
        assert!(matches!(tokenize("   "), Err(ExecError::Empty)));
        assert!(matches!(tokenize("echo 'oops"), Err(ExecError::Syntax(_))));
    }

    #[test]
    fn test_exit_code_and_stderr() {
        let output = run_with_timeout(&argv(&["sh", "-c", "echo broken >&2; exit 3"]), Duration::from_secs(5)).unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[test]
    fn test_stdout_captured() {
        let output = run_with_timeout(&argv(&["echo", "hello"]), Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_missing_binary() {
        let result = run_with_timeout(&argv(&["opsmon-definitely-missing-binary"]), Duration::from_secs(1));
        assert!(matches!(result, Err(ExecError::NotFound(name)) if name == "opsmon-definitely-missing-binary"));
    }

    #[test]
    fn test_deadline_kills_child() {
        let start = Instant::now();
        let result = run_with_timeout(&argv(&["sleep", "5"]), Duration::from_millis(200));
        assert!(matches!(result, Err(ExecError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_background_child_does_not_hold_the_deadline() {
        let start = Instant::now();
        let output = run_with_timeout(&argv(&["sh", "-c", "echo started; sleep 4 & exit 0"]), Duration::from_secs(1))
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(1500));
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "started");
    }

    #[tokio::test]
    async fn test_pooled_deadline_excludes_queue_time() {
        let pool = BlockingPool::new(1);
        let slow = run_pooled(&pool, argv(&["sleep", "1"]), Duration::from_secs(3));
        let fast = run_pooled(&pool, argv(&["true"]), Duration::from_millis(800));

        let (slow, fast) = tokio::join!(slow, fast);
        assert!(slow.unwrap().success());
        assert!(fast.unwrap().success());
    }

    #[tokio::test]
    async fn test_run_pooled() {
        let pool = BlockingPool::new(1);
        let output = run_pooled(&pool, argv(&["true"]), Duration::from_secs(5)).await.unwrap();
        assert!(output.success());
    }
}
