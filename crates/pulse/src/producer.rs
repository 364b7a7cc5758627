//! The refresh unit shared by the live consumers.
//!
//! Each consumer owns one [`StatusProducer`]: resolve the resources, check them,
//! summarize. The terminal dashboard calls [`StatusProducer::refresh`] on its
//! own timer; the SSE endpoint turns the producer into a frame stream.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, Stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::checker::{CheckReport, HealthChecker, Summary};
use crate::error::PulseError;
use crate::resource::ResourceSet;
use crate::view::StreamFrame;

/// Where the resources to check come from
#[async_trait::async_trait]
pub trait ResourceSource: Send + Sync {
    async fn load(&self) -> Result<ResourceSet, PulseError>;
}

/// A fixed set, for one-off checks
#[async_trait::async_trait]
impl ResourceSource for ResourceSet {
    async fn load(&self) -> Result<ResourceSet, PulseError> {
        Ok(self.clone())
    }
}

/// Outcome of one refresh
#[derive(Debug, Clone)]
pub struct Refresh {
    pub report: Arc<CheckReport>,
    pub summary: Summary,
}

pub struct StatusProducer {
    source: Arc<dyn ResourceSource>,
    checker: HealthChecker,
}

impl StatusProducer {
    pub fn new(source: Arc<dyn ResourceSource>, checker: HealthChecker) -> Self {
        Self { source, checker }
    }

    pub fn checker(&self) -> &HealthChecker {
        &self.checker
    }

    /// Resolve, check and summarize once
    pub async fn refresh(&self) -> Result<Refresh, PulseError> {
        let resources = self.source.load().await?;

        AssertUnwindSafe(self.checker.check_all(&resources.websites, &resources.apps, &resources.servers))
            .catch_unwind()
            .await
            .map_err(|_| PulseError::CheckPanicked)?;

        Ok(Refresh { report: self.checker.last_report(), summary: self.checker.get_summary() })
    }

    /// One stream frame; failures become error frames
    pub async fn frame(&self) -> Frame {
        match self.refresh().await {
            Ok(refresh) => Frame::Status(StreamFrame::new(&refresh.report, &refresh.summary)),
            Err(err) => {
                warn!(error = %err, "status refresh failed");
                Frame::error(err.to_string())
            }
        }
    }

    /// Endless frame stream: check, yield, wait `interval`, repeat.
    ///
    /// Cancellation is observed before every check and during every wait.
    /// Dropping the stream stops it as well.
    pub fn into_frames(self, interval: Duration, cancel: CancellationToken) -> impl Stream<Item = Frame> + Send {
        futures::stream::unfold((self, cancel, true), move |(producer, cancel, first)| async move {
            if !first {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            if cancel.is_cancelled() {
                debug!("status stream cancelled");
                return None;
            }

            let frame = producer.frame().await;
            Some((frame, (producer, cancel, false)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorFrame {
    pub error: String,
}

/// One SSE payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Frame {
    Status(StreamFrame),
    Error(ErrorFrame),
}

impl Frame {
    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(ErrorFrame { error: message.into() })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({ "error": PulseError::Encode(err).to_string() }).to_string()
        })
    }

    /// `data: <json>` event terminated by a blank line
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::pool::BlockingPool;

    fn producer(source: impl ResourceSource + 'static) -> StatusProducer {
        let checker = HealthChecker::new(BlockingPool::new(1), Duration::from_millis(100)).unwrap();
        StatusProducer::new(Arc::new(source), checker)
    }

    #[tokio::test]
    async fn test_refresh_empty_set() {
        let refresh = producer(ResourceSet::default()).refresh().await.unwrap();
        assert!(refresh.report.is_empty());
        assert_eq!(refresh.summary.health_percent, 0.0);
    }

    #[test]
    fn test_sse_encoding() {
        assert_eq!(Frame::error("boom").to_sse(), "data: {\"error\":\"boom\"}\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_stream_ends() {
        let cancel = CancellationToken::new();
        let mut frames = Box::pin(producer(ResourceSet::default()).into_frames(Duration::from_secs(10), cancel.clone()));

        assert!(matches!(frames.next().await, Some(Frame::Status(_))));
        cancel.cancel();
        assert!(frames.next().await.is_none());
    }
}
