//! Status producer and SSE frame stream

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use pulse::{Frame, PulseError, ResourceSet, ResourceSource, StatusProducer, WebsiteConfig};
use tokio_util::sync::CancellationToken;

/// Fails on the listed calls, succeeds otherwise
struct FlakySource {
    calls: AtomicUsize,
    failing: Vec<usize>,
}

#[async_trait::async_trait]
impl ResourceSource for FlakySource {
    async fn load(&self) -> Result<ResourceSet, PulseError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            return Err(PulseError::Source("store unavailable".into()));
        }
        Ok(ResourceSet::default())
    }
}

fn flaky(failing: Vec<usize>) -> StatusProducer {
    StatusProducer::new(Arc::new(FlakySource { calls: AtomicUsize::new(0), failing }), common::checker())
}

#[tokio::test(start_paused = true)]
async fn test_failed_iteration_yields_one_error_frame() {
    let frames: Vec<Frame> =
        flaky(vec![1]).into_frames(Duration::from_secs(10), CancellationToken::new()).take(3).collect().await;

    assert!(!frames[0].is_error());
    assert!(frames[1].is_error());
    assert!(frames[1].to_json().contains("store unavailable"));
    assert!(!frames[2].is_error());
}

#[tokio::test(start_paused = true)]
async fn test_frames_are_spaced_by_interval() {
    let mut frames = Box::pin(flaky(vec![]).into_frames(Duration::from_secs(10), CancellationToken::new()));

    let start = tokio::time::Instant::now();
    frames.next().await;
    frames.next().await;
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_stops_stream() {
    let cancel = CancellationToken::new();
    let mut frames = Box::pin(flaky(vec![]).into_frames(Duration::from_secs(10), cancel.clone()));
    frames.next().await;

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        stopper.cancel();
    });

    let start = tokio::time::Instant::now();
    assert!(frames.next().await.is_none());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_status_frame_summary() {
    let url = common::http_server(200, Duration::ZERO).await;
    let set = ResourceSet {
        websites: vec![WebsiteConfig::new("ok", &url), WebsiteConfig::new("down", "http://localhost:9/")],
        ..Default::default()
    };

    let producer = StatusProducer::new(Arc::new(set), common::checker());
    let refresh = producer.refresh().await.unwrap();
    assert_eq!(refresh.summary.total, 2);
    assert_eq!(refresh.summary.health_percent, 50.0);
    assert!((0.0..=100.0).contains(&refresh.summary.health_percent));

    let sse = producer.frame().await.to_sse();
    assert!(sse.starts_with("data: {"));
    assert!(sse.ends_with("\n\n"));
    assert!(sse.contains("\"status\":\"online\""));
}
