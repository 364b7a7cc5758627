//! Pulse - health probing and live status aggregation for opsmon
//!
//! This library measures the health of websites, applications and servers
//! drawn from two configuration stores, classifies the outcomes and feeds
//! them to the live consumers (terminal dashboard and SSE stream).

pub mod cache;
pub mod checker;
pub mod error;
pub mod exec;
pub mod pool;
pub mod probe;
pub mod producer;
pub mod resolver;
pub mod resource;
pub mod settings;
pub mod store;
pub mod view;

// Re-export main types
pub use cache::TtlCache;
pub use checker::{CheckReport, HealthChecker, HealthResult, HealthStatus, Summary};
pub use error::PulseError;
pub use pool::BlockingPool;
pub use probe::{CheckPlan, ProbeOutcome, ProbeSet};
pub use producer::{Frame, Refresh, ResourceSource, StatusProducer};
pub use resolver::Resolver;
pub use resource::{
    AppConfig, AppKind, ResourceDescriptor, ResourceKind, ResourceSet, ServerCheck, ServerConfig,
    WebsiteConfig,
};
pub use settings::{Settings, default_config_dir};
pub use store::{OverlaySettings, OverlayStore};
pub use view::{PollResponse, StreamFrame};

/// Pulse result type
pub type Result<T> = std::result::Result<T, PulseError>;

/// Number of results kept per resource for uptime and failure streaks
pub const HISTORY_WINDOW: usize = 100;
