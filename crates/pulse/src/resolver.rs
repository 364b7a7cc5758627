use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PulseError;
use crate::producer::ResourceSource;
use crate::resource::{AppConfig, ResourceDescriptor, ResourceKind, ResourceSet, ServerConfig, WebsiteConfig};
use crate::settings::Settings;
use crate::store::{DedicatedStore, OverlayStore};

/// Merge two layers by name: overlay entries first, the first occurrence of a name wins
fn merge<T>(overlay: Vec<T>, dedicated: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(overlay.len() + dedicated.len());
    for entry in overlay.into_iter().chain(dedicated) {
        if seen.insert(name(&entry).to_string()) {
            merged.push(entry);
        }
    }
    merged
}

fn merge_sets(overlay: ResourceSet, dedicated: ResourceSet) -> ResourceSet {
    ResourceSet {
        websites: merge(overlay.websites, dedicated.websites, |w: &WebsiteConfig| &w.name),
        apps: merge(overlay.apps, dedicated.apps, |a: &AppConfig| &a.name),
        servers: merge(overlay.servers, dedicated.servers, |s: &ServerConfig| &s.name),
    }
}

fn only_enabled(mut set: ResourceSet) -> ResourceSet {
    set.websites.retain(|w| w.enabled);
    set.apps.retain(|a| a.enabled);
    set.servers.retain(|s| s.enabled);
    set
}

/// Single authoritative resource list built from the overlay and the dedicated stores.
///
/// Files are re-read on every call so edits from other processes show up on the next refresh.
#[derive(Debug, Clone)]
pub struct Resolver {
    dedicated: DedicatedStore,
    overlay: OverlayStore,
}

impl Resolver {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dedicated: DedicatedStore::new(dir.as_ref()), overlay: OverlayStore::new(dir) }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PulseError> {
        let dir: PathBuf = settings.stores_dir()?;
        Ok(Self::new(dir))
    }

    pub fn overlay(&self) -> &OverlayStore {
        &self.overlay
    }

    /// Union of both layers, disabled entries included
    pub fn list_all(&self) -> ResourceSet {
        merge_sets(self.overlay.load(), self.dedicated.load())
    }

    /// Enabled resources to probe
    pub fn resolve_all(&self) -> ResourceSet {
        let set = only_enabled(self.list_all());
        debug!(websites = set.websites.len(), apps = set.apps.len(), servers = set.servers.len(), "resolved resources");
        set
    }

    pub fn resolve_websites(&self) -> Vec<WebsiteConfig> {
        let merged = merge(self.overlay.load().websites, self.dedicated.websites(), |w| &w.name);
        merged.into_iter().filter(|w| w.enabled).collect()
    }

    pub fn resolve_apps(&self) -> Vec<AppConfig> {
        let merged = merge(self.overlay.load().apps, self.dedicated.apps(), |a| &a.name);
        merged.into_iter().filter(|a| a.enabled).collect()
    }

    pub fn resolve_servers(&self) -> Vec<ServerConfig> {
        let merged = merge(self.overlay.load().servers, self.dedicated.servers(), |s| &s.name);
        merged.into_iter().filter(|s| s.enabled).collect()
    }

    pub fn resolve(&self, kind: ResourceKind) -> Vec<ResourceDescriptor> {
        match kind {
            ResourceKind::Website => self.resolve_websites().into_iter().map(ResourceDescriptor::Website).collect(),
            ResourceKind::App => self.resolve_apps().into_iter().map(ResourceDescriptor::App).collect(),
            ResourceKind::Server => self.resolve_servers().into_iter().map(ResourceDescriptor::Server).collect(),
        }
    }

    /// Unfiltered union for one type
    pub fn list(&self, kind: ResourceKind) -> Vec<ResourceDescriptor> {
        self.list_all().descriptors().into_iter().filter(|descriptor| descriptor.kind() == kind).collect()
    }
}

#[async_trait::async_trait]
impl ResourceSource for Resolver {
    async fn load(&self) -> Result<ResourceSet, PulseError> {
        let resolver = self.clone();
        Ok(tokio::task::spawn_blocking(move || resolver.resolve_all()).await?)
    }
}
