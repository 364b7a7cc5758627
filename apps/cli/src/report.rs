//! Plain-text output for the one-shot commands.

use std::fmt::Write;
use std::time::Duration;

use pulse::{CheckReport, HealthStatus, OverlaySettings, ResourceKind, ResourceSet, Summary};

pub fn status_symbol(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "+",
        HealthStatus::Unhealthy => "x",
        HealthStatus::Degraded => "!",
        HealthStatus::Unknown => "?",
        HealthStatus::Checking => ".",
    }
}

pub fn format_latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) if ms >= 1000.0 => format!("{:.1}s", ms / 1000.0),
        Some(ms) => format!("{ms:.0}ms"),
        None => "-".to_string(),
    }
}

pub fn format_uptime(uptime_percent: Option<f64>) -> String {
    uptime_percent.map(|percent| format!("{percent:.1}%")).unwrap_or_else(|| "-".to_string())
}

/// HH:MM:SS
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn summary_line(summary: &Summary) -> String {
    format!(
        "{}/{} healthy ({:.1}%), {} unhealthy, {} degraded, {} unknown",
        summary.healthy,
        summary.total,
        summary.health_percent,
        summary.unhealthy,
        summary.degraded,
        summary.unknown + summary.checking,
    )
}

fn title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Website => "Websites",
        ResourceKind::App => "Applications",
        ResourceKind::Server => "Servers",
    }
}

/// One section per resource type, followed by the aggregate line
pub fn render_report(report: &CheckReport, summary: &Summary) -> String {
    let mut out = String::new();

    for kind in ResourceKind::ALL {
        let results = report.results(kind);
        if results.is_empty() {
            continue;
        }

        let width = results.iter().map(|result| result.name.len()).max().unwrap_or(0);
        let _ = writeln!(out, "{}", title(kind));
        for result in results {
            let _ = writeln!(
                out,
                "  {} {:<width$}  {:<9}  {:>7}  {}",
                status_symbol(result.status),
                result.name,
                result.status.to_string(),
                format_latency(result.response_time_ms),
                result.message,
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{}", summary_line(summary));
    out
}

fn enabled(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Every configured resource with the fields that decide how it is checked
pub fn render_listing(resources: &ResourceSet) -> String {
    if resources.is_empty() {
        return empty_hint();
    }

    let mut out = String::new();
    if !resources.websites.is_empty() {
        let _ = writeln!(out, "{}", title(ResourceKind::Website));
        for website in &resources.websites {
            let _ = writeln!(
                out,
                "  {}  {} {}  expect {}  timeout {}s  enabled {}",
                website.name,
                website.method,
                website.url,
                website.expected_status,
                website.timeout,
                enabled(website.enabled),
            );
        }
        out.push('\n');
    }

    if !resources.apps.is_empty() {
        let _ = writeln!(out, "{}", title(ResourceKind::App));
        for app in &resources.apps {
            let target = match (&app.host, app.port) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.clone(),
                (None, Some(port)) => format!(":{port}"),
                (None, None) => "--".to_string(),
            };
            let identifier = if app.identifier.is_empty() { "--" } else { app.identifier.as_str() };
            let _ = writeln!(
                out,
                "  {}  {}  {}  {}  enabled {}",
                app.name,
                app.kind,
                identifier,
                target,
                enabled(app.enabled),
            );
        }
        out.push('\n');
    }

    if !resources.servers.is_empty() {
        let _ = writeln!(out, "{}", title(ResourceKind::Server));
        for server in &resources.servers {
            let _ = writeln!(
                out,
                "  {}  {}:{}  {}  enabled {}",
                server.name,
                server.host,
                server.port,
                server.check_type,
                enabled(server.enabled),
            );
        }
        out.push('\n');
    }

    out
}

pub fn render_settings(settings: &OverlaySettings) -> String {
    format!(
        "Monitoring settings:\n  Refresh Interval: {}s\n  Failure Threshold: {} consecutive failures\n",
        settings.refresh_interval, settings.failure_threshold
    )
}

pub fn empty_hint() -> String {
    [
        "No resources configured for monitoring.",
        "",
        "Add resources using:",
        "  opsmon monitor add-website --name mysite --url https://example.com",
        "  opsmon monitor add-app --name myapp --type docker --identifier container-name",
        "  opsmon monitor add-server --name web1 --host 10.0.1.10",
        "",
    ]
    .join("\n")
}
