//! JSON shapes served to browsers.
//!
//! Statuses are renamed for the dashboard: healthy is `online`, unhealthy is `offline`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::checker::{CheckReport, HealthResult, HealthStatus, Summary};

pub fn public_status(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "online",
        HealthStatus::Unhealthy => "offline",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Unknown => "unknown",
        HealthStatus::Checking => "checking",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub name: String,
    pub status: &'static str,
    pub response_time: Option<f64>,
    pub message: String,
    pub details: BTreeMap<String, Value>,
    pub checked_at: String,
    pub consecutive_failures: u32,
    pub uptime_percent: Option<f64>,
}

impl From<&HealthResult> for ResultView {
    fn from(result: &HealthResult) -> Self {
        Self {
            name: result.name.clone(),
            status: public_status(result.status),
            response_time: result.response_time_ms,
            message: result.message.clone(),
            details: result.details.clone(),
            checked_at: result.checked_at.to_rfc3339(),
            consecutive_failures: result.consecutive_failures,
            uptime_percent: result.uptime_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryView {
    pub online: usize,
    pub offline: usize,
    pub degraded: usize,
    pub unknown: usize,
    pub total: usize,
    pub health_percent: f64,
}

impl From<&Summary> for SummaryView {
    fn from(summary: &Summary) -> Self {
        Self {
            online: summary.healthy,
            offline: summary.unhealthy,
            degraded: summary.degraded,
            unknown: summary.unknown + summary.checking,
            total: summary.total,
            health_percent: summary.health_percent,
        }
    }
}

/// Body of `GET /api/monitoring`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub websites: Vec<ResultView>,
    pub apps: Vec<ResultView>,
    pub servers: Vec<ResultView>,
    pub summary: SummaryView,
}

impl PollResponse {
    pub fn new(report: &CheckReport, summary: &Summary) -> Self {
        Self {
            websites: report.websites.iter().map(ResultView::from).collect(),
            apps: report.apps.iter().map(ResultView::from).collect(),
            servers: report.servers.iter().map(ResultView::from).collect(),
            summary: summary.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEntry {
    pub name: String,
    pub status: &'static str,
    pub response_time: Option<f64>,
}

impl From<&HealthResult> for StreamEntry {
    fn from(result: &HealthResult) -> Self {
        Self { name: result.name.clone(), status: public_status(result.status), response_time: result.response_time_ms }
    }
}

/// Compact frame pushed on the SSE stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamFrame {
    pub websites: Vec<StreamEntry>,
    pub apps: Vec<StreamEntry>,
    pub servers: Vec<StreamEntry>,
    pub summary: SummaryView,
}

impl StreamFrame {
    pub fn new(report: &CheckReport, summary: &Summary) -> Self {
        Self {
            websites: report.websites.iter().map(StreamEntry::from).collect(),
            apps: report.apps.iter().map(StreamEntry::from).collect(),
            servers: report.servers.iter().map(StreamEntry::from).collect(),
            summary: summary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::resource::ResourceKind;

    #[test]
    fn test_stream_frame_shape() {
        let mut report = CheckReport::empty();
        report.websites.push(HealthResult::from_outcome(
            "main",
            ResourceKind::Website,
            ProbeOutcome::healthy("HTTP 200").with_latency_ms(Some(42.0)),
        ));
        report.servers.push(HealthResult::from_outcome("db", ResourceKind::Server, ProbeOutcome::unhealthy("Timeout")));
        let summary = report.summary();

        let json = serde_json::to_value(StreamFrame::new(&report, &summary)).unwrap();
        assert_eq!(json["websites"][0], serde_json::json!({"name": "main", "status": "online", "response_time": 42.0}));
        assert_eq!(json["servers"][0]["status"], "offline");
        assert_eq!(json["summary"]["online"], 1);
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["health_percent"], 50.0);
    }

    #[test]
    fn test_poll_response_includes_details() {
        let mut report = CheckReport::empty();
        report.apps.push(HealthResult::from_outcome(
            "api",
            ResourceKind::App,
            ProbeOutcome::degraded("HTTP 404 (expected 200)").with_detail("status_code", 404),
        ));
        let summary = report.summary();

        let json = serde_json::to_value(PollResponse::new(&report, &summary)).unwrap();
        assert_eq!(json["apps"][0]["status"], "degraded");
        assert_eq!(json["apps"][0]["details"]["status_code"], 404);
        assert!(json["apps"][0]["checked_at"].is_string());
        assert_eq!(json["summary"]["degraded"], 1);
    }
}
