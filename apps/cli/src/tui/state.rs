use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use pulse::{PulseError, Refresh};

/// Where the dashboard loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    Rendered,
    Stopped,
}

pub struct DashboardState {
    pub phase: Phase,
    pub interval: Duration,
    pub ticks: u64,
    pub started_at: Instant,
    pub last_refresh: Option<Refresh>,
    pub last_checked: Option<DateTime<Local>>,
    /// Failure of the most recent refresh, cleared by the next success
    pub last_error: Option<String>,
}

impl DashboardState {
    pub fn new(interval: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            interval,
            ticks: 0,
            started_at: Instant::now(),
            last_refresh: None,
            last_checked: None,
            last_error: None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    pub fn begin_check(&mut self) {
        if !self.is_stopped() {
            self.phase = Phase::Checking;
        }
    }

    /// Record a finished refresh; ignored once stopped
    pub fn finish_check(&mut self, result: Result<Refresh, PulseError>) {
        if self.is_stopped() {
            return;
        }

        self.ticks += 1;
        match result {
            Ok(refresh) => {
                self.last_refresh = Some(refresh);
                self.last_checked = Some(Local::now());
                self.last_error = None;
            }
            Err(err) => self.last_error = Some(err.to_string()),
        }
        self.phase = Phase::Rendered;
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pulse::CheckReport;

    use super::*;

    fn refresh() -> Refresh {
        let report = CheckReport::empty();
        let summary = report.summary();
        Refresh { report: Arc::new(report), summary }
    }

    #[test]
    fn test_tick_cycle() {
        let mut state = DashboardState::new(Duration::from_secs(5));
        assert_eq!(state.phase, Phase::Idle);

        state.begin_check();
        assert_eq!(state.phase, Phase::Checking);
        state.finish_check(Ok(refresh()));
        assert_eq!(state.phase, Phase::Rendered);
        assert_eq!(state.ticks, 1);
        assert!(state.last_checked.is_some());
    }

    #[test]
    fn test_failed_refresh_keeps_last_report() {
        let mut state = DashboardState::new(Duration::from_secs(5));
        state.begin_check();
        state.finish_check(Ok(refresh()));
        state.begin_check();
        state.finish_check(Err(PulseError::Source("stores offline".into())));

        assert_eq!(state.ticks, 2);
        assert!(state.last_refresh.is_some());
        assert_eq!(state.last_error.as_deref(), Some("resource source failed: stores offline"));

        state.begin_check();
        state.finish_check(Ok(refresh()));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut state = DashboardState::new(Duration::from_secs(5));
        state.begin_check();
        state.stop();
        state.finish_check(Ok(refresh()));
        state.begin_check();

        assert!(state.is_stopped());
        assert_eq!(state.ticks, 0);
    }
}
