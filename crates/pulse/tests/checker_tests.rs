//! Health checker behaviour against local targets

mod common;

use std::time::{Duration, Instant};

use pulse::{HealthStatus, ServerCheck, ServerConfig, WebsiteConfig};

fn website(name: &str, url: &str, timeout: u64) -> WebsiteConfig {
    let mut website = WebsiteConfig::new(name, url);
    website.timeout = timeout;
    website
}

#[tokio::test]
async fn test_results_keep_input_order() {
    let checker = common::checker();
    let fast = common::http_server(200, Duration::ZERO).await;
    let slow = common::http_server(200, Duration::from_millis(600)).await;

    let sites = [website("a", &fast, 5), website("b", &slow, 5), website("c", &fast, 5)];
    let report = checker.check_all(&sites, &[], &[]).await;

    let names: Vec<_> = report.websites.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert!(report.websites.iter().all(|r| r.status == HealthStatus::Healthy));
    assert!(report.websites[1].response_time_ms.unwrap() >= 500.0);
}

#[tokio::test]
async fn test_probes_run_concurrently() {
    let checker = common::checker();
    let slow = common::http_server(200, Duration::from_millis(500)).await;

    let sites: Vec<_> = (0..5).map(|i| website(&format!("s{i}"), &slow, 5)).collect();
    let start = Instant::now();
    checker.check_all(&sites, &[], &[]).await;
    assert!(start.elapsed() < Duration::from_millis(2000));
}

#[tokio::test]
async fn test_closed_port_is_refused() {
    let checker = common::checker();

    let result = checker.check_website(&website("closed", "http://localhost:9/", 1)).await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert!(result.message.to_lowercase().contains("refused"), "message was {}", result.message);
    assert!(result.response_time_ms.is_none());
}

#[tokio::test]
async fn test_server_error_quotes_both_codes() {
    let checker = common::checker();
    let url = common::http_server(503, Duration::ZERO).await;

    let result = checker.check_website(&website("api", &url, 5)).await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert!(result.message.contains("503") && result.message.contains("200"));
    assert!(result.response_time_ms.is_some());
    assert_eq!(result.details["status_code"], 503);
}

#[tokio::test]
async fn test_client_error_is_degraded() {
    let checker = common::checker();
    let url = common::http_server(404, Duration::ZERO).await;

    let result = checker.check_website(&website("docs", &url, 5)).await;
    assert_eq!(result.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_timeout_is_bounded() {
    let checker = common::checker();
    let url = common::silent_server().await;

    let start = Instant::now();
    let result = checker.check_website(&website("hung", &url, 1)).await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert!(result.message.starts_with("Timeout"));
    assert!(start.elapsed() < Duration::from_millis(1800));
}

#[tokio::test]
async fn test_server_http_accepts_below_500() {
    let checker = common::checker();
    let url = common::http_server(404, Duration::ZERO).await;

    let mut server = ServerConfig::new("edge", "127.0.0.1");
    server.check_type = ServerCheck::Http;
    server.http_endpoint = Some(url);

    assert_eq!(checker.check_server(&server).await.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_repeated_checks_are_stable() {
    let checker = common::checker();
    let url = common::http_server(200, Duration::ZERO).await;
    let sites = [website("a", &url, 5), website("b", "http://localhost:9/", 1)];

    let first = checker.check_all(&sites, &[], &[]).await;
    let second = checker.check_all(&sites, &[], &[]).await;

    let shape = |report: &pulse::CheckReport| {
        report.websites.iter().map(|r| (r.name.clone(), r.status, r.message.clone())).collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(second.websites[1].consecutive_failures, 2);
}
