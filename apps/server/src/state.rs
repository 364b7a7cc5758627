use std::sync::Arc;

use pulse::{
    HealthChecker, PollResponse, ProbeSet, PulseError, Resolver, ResourceSet, ResourceSource, Settings,
    StatusProducer, TtlCache,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const POLL_KEY: &str = "status";
pub const LISTING_KEY: &str = "resources";

/// Shared by every worker through `web::Data`
pub struct AppState {
    pub settings: Settings,
    pub resolver: Resolver,
    /// Resources checked by the poll and stream endpoints
    pub source: Arc<dyn ResourceSource>,
    /// One HTTP client and one blocking pool for the whole server
    pub probes: Arc<ProbeSet>,
    /// Producer behind the cached poll endpoint
    pub poll: StatusProducer,
    pub poll_cache: TtlCache<&'static str, Arc<PollResponse>>,
    /// Held while the poll snapshot is rebuilt so concurrent misses check once
    pub poll_refresh: Mutex<()>,
    pub listing_cache: TtlCache<&'static str, Arc<ResourceSet>>,
    /// Cancelled on shutdown; every stream holds a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, PulseError> {
        let resolver = Resolver::from_settings(&settings)?;
        Self::build(settings, resolver.clone(), Arc::new(resolver))
    }

    /// Check resources from `source` instead of the configured stores
    pub fn with_source(settings: Settings, source: Arc<dyn ResourceSource>) -> Result<Self, PulseError> {
        let resolver = Resolver::from_settings(&settings)?;
        Self::build(settings, resolver, source)
    }

    fn build(settings: Settings, resolver: Resolver, source: Arc<dyn ResourceSource>) -> Result<Self, PulseError> {
        let probes = Arc::new(ProbeSet::from_settings(&settings.monitor)?);
        let poll = StatusProducer::new(source.clone(), HealthChecker::with_probes(probes.clone()));

        Ok(Self {
            poll_cache: TtlCache::new(settings.monitor.poll_cache_ttl()),
            listing_cache: TtlCache::new(settings.monitor.listing_cache_ttl()),
            poll_refresh: Mutex::new(()),
            shutdown: CancellationToken::new(),
            resolver,
            source,
            probes,
            poll,
            settings,
        })
    }

    /// Producer for one stream: own history and last report, shared probes
    pub fn stream_producer(&self) -> StatusProducer {
        StatusProducer::new(self.source.clone(), HealthChecker::with_probes(self.probes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_share_strategies() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.stores.dir = Some(dir.path().to_path_buf());
        let state = AppState::new(settings).unwrap();

        let first = state.stream_producer();
        let second = state.stream_producer();
        assert!(Arc::ptr_eq(first.checker().probes(), &state.probes));
        assert!(Arc::ptr_eq(second.checker().probes(), state.poll.checker().probes()));
        assert!(!std::ptr::eq(first.checker(), second.checker()));
    }
}
