//! YAML backing stores.
//!
//! Two independently edited sources describe resources:
//! - the dedicated stores (`websites.yaml`, `apps.yaml`, `servers.yaml`), maps keyed by name
//! - the monitoring overlay (`monitoring.yaml`), plain lists plus dashboard settings
//!
//! Reads are lenient: a missing or broken file, or a broken entry, is logged and skipped.
//! Overlay writes are strict and refuse to rewrite a file they cannot parse.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::PulseError;
use crate::resource::{AppConfig, AppKind, ResourceKind, ResourceSet, ServerCheck, ServerConfig, WebsiteConfig};

pub const OVERLAY_FILE: &str = "monitoring.yaml";
pub const WEBSITES_FILE: &str = "websites.yaml";
pub const APPS_FILE: &str = "apps.yaml";
pub const SERVERS_FILE: &str = "servers.yaml";

/// Read and parse a YAML document; `None` when missing or unreadable
fn read_document(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "store file not present");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read store file, ignoring it");
            return None;
        }
    };

    match serde_yaml::from_str::<Value>(&raw) {
        Ok(Value::Null) => None,
        Ok(document) => Some(document),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to parse store file, ignoring it");
            None
        }
    }
}

fn parse_entry<T: DeserializeOwned>(value: Value, path: &Path, section: &str) -> Option<T> {
    match serde_yaml::from_value(value) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(path = %path.display(), section, error = %err, "skipping malformed entry");
            None
        }
    }
}

/// Entries of a name-keyed map section, in file order
fn keyed_entries<T: DeserializeOwned>(document: Option<&Value>, path: &Path, section: &str) -> Vec<(String, T)> {
    let Some(Value::Mapping(map)) = document.and_then(|document| document.get(section)) else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(name, entry)| {
            let name = name.as_str()?.to_string();
            parse_entry(entry.clone(), path, section).map(|entry| (name, entry))
        })
        .collect()
}

/// Entries of a list section, in file order
fn listed_entries<T: DeserializeOwned>(document: Option<&Value>, path: &Path, section: &str) -> Vec<T> {
    let Some(Value::Sequence(list)) = document.and_then(|document| document.get(section)) else {
        return Vec::new();
    };

    list.iter().filter_map(|entry| parse_entry(entry.clone(), path, section)).collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct StoredWebsite {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    expected_status: Option<u16>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    added_at: Option<String>,
}

impl StoredWebsite {
    fn into_config(self, name: String) -> WebsiteConfig {
        let mut website = WebsiteConfig::new(name, self.url);
        if let Some(method) = self.method {
            website.method = method;
        }
        if let Some(expected_status) = self.expected_status {
            website.expected_status = expected_status;
        }
        if let Some(timeout) = self.timeout {
            website.timeout = timeout;
        }
        website.headers = self.headers;
        website.enabled = self.enabled;
        website.created_at = self.added_at;
        website
    }
}

#[derive(Debug, Default, Deserialize)]
struct StoredHealth {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    container: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StoredDocker {
    #[serde(default)]
    container: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredApp {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "health_check")]
    health: Option<StoredHealth>,
    #[serde(default)]
    docker: Option<StoredDocker>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    added_at: Option<String>,
}

impl StoredApp {
    /// The health section decides how the app is probed; the app type is the fallback
    fn into_config(self, name: String) -> AppConfig {
        let container = self.docker.and_then(|docker| docker.container);
        let health = self.health.unwrap_or_default();

        let kind = match health.kind.as_deref().or(self.kind.as_deref()) {
            Some("tcp") => AppKind::Port,
            Some(kind) => AppKind::from(kind.to_string()),
            None if container.is_some() => AppKind::Docker,
            None => AppKind::Other("custom".to_string()),
        };

        let identifier = match kind {
            AppKind::Docker => health.container.or(container).unwrap_or_else(|| name.clone()),
            _ => name.clone(),
        };

        let mut app = AppConfig::new(name, kind, identifier);
        app.health_endpoint = health.url;
        app.host = health.host;
        app.port = health.port;
        app.command = health.command;
        app.timeout = health.timeout;
        app.enabled = self.enabled;
        app.created_at = self.added_at;
        app
    }
}

fn default_ssh_check() -> String {
    "ssh".to_string()
}

#[derive(Debug, Deserialize)]
struct StoredServer {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default = "default_ssh_check")]
    check: String,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    added_at: Option<String>,
}

impl StoredServer {
    fn into_config(self, name: String) -> ServerConfig {
        let mut server = ServerConfig::new(name, self.host);
        if let Some(port) = self.port {
            server.port = port;
        }
        server.check_type = ServerCheck::from(self.check);
        server.ssh_user = self.user;
        server.timeout = self.timeout;
        server.enabled = self.enabled;
        server.created_at = self.added_at;
        server
    }
}

/// Per-type stores maintained by the admin tooling
#[derive(Debug, Clone)]
pub struct DedicatedStore {
    dir: PathBuf,
}

impl DedicatedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn websites(&self) -> Vec<WebsiteConfig> {
        let path = self.dir.join(WEBSITES_FILE);
        let document = read_document(&path);
        keyed_entries::<StoredWebsite>(document.as_ref(), &path, "websites")
            .into_iter()
            .map(|(name, entry)| entry.into_config(name))
            .collect()
    }

    pub fn apps(&self) -> Vec<AppConfig> {
        let path = self.dir.join(APPS_FILE);
        let document = read_document(&path);
        keyed_entries::<StoredApp>(document.as_ref(), &path, "apps")
            .into_iter()
            .map(|(name, entry)| entry.into_config(name))
            .collect()
    }

    pub fn servers(&self) -> Vec<ServerConfig> {
        let path = self.dir.join(SERVERS_FILE);
        let document = read_document(&path);
        keyed_entries::<StoredServer>(document.as_ref(), &path, "servers")
            .into_iter()
            .map(|(name, entry)| entry.into_config(name))
            .collect()
    }

    pub fn load(&self) -> ResourceSet {
        ResourceSet { websites: self.websites(), apps: self.apps(), servers: self.servers() }
    }
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

/// Dashboard settings kept in the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Keys this crate does not use, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            failure_threshold: default_failure_threshold(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct OverlayFile {
    #[serde(default)]
    websites: Vec<WebsiteConfig>,
    #[serde(default)]
    apps: Vec<AppConfig>,
    #[serde(default)]
    servers: Vec<ServerConfig>,
    #[serde(default)]
    settings: OverlaySettings,
}

/// The monitoring overlay edited by `monitor add-*`
#[derive(Debug, Clone)]
pub struct OverlayStore {
    path: PathBuf,
}

impl OverlayStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(OVERLAY_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lenient read of all entries, including disabled ones
    pub fn load(&self) -> ResourceSet {
        let document = read_document(&self.path);
        ResourceSet {
            websites: listed_entries(document.as_ref(), &self.path, "websites"),
            apps: listed_entries(document.as_ref(), &self.path, "apps"),
            servers: listed_entries(document.as_ref(), &self.path, "servers"),
        }
    }

    /// Dashboard settings, defaults when absent or unreadable
    pub fn settings(&self) -> OverlaySettings {
        self.stored_settings().unwrap_or_default()
    }

    /// Settings block as written in the overlay, if there is one
    pub fn stored_settings(&self) -> Option<OverlaySettings> {
        read_document(&self.path)
            .and_then(|document| document.get("settings").cloned())
            .and_then(|settings| parse_entry(settings, &self.path, "settings"))
    }

    fn read_strict(&self) -> Result<OverlayFile, PulseError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(OverlayFile::default()),
            Ok(raw) => serde_yaml::from_str(&raw)
                .map_err(|err| PulseError::Parse { path: self.path.clone(), message: err.to_string() }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(OverlayFile::default()),
            Err(source) => Err(PulseError::Read { path: self.path.clone(), source }),
        }
    }

    /// Replace the overlay atomically: readers see the old file or the new one
    fn write(&self, file: &OverlayFile) -> Result<(), PulseError> {
        let yaml = serde_yaml::to_string(file).map_err(|err| PulseError::Serialize(err.to_string()))?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|source| PulseError::Write { path: parent.to_path_buf(), source })?;

        let write_error = |source| PulseError::Write { path: self.path.clone(), source };
        let mut staged = NamedTempFile::new_in(parent).map_err(write_error)?;
        staged.write_all(yaml.as_bytes()).map_err(write_error)?;
        staged.as_file().sync_all().map_err(write_error)?;
        staged.persist(&self.path).map_err(|err| write_error(err.error))?;
        Ok(())
    }

    fn stamp(created_at: &mut Option<String>) {
        if created_at.is_none() {
            *created_at = Some(Utc::now().to_rfc3339());
        }
    }

    pub fn add_website(&self, mut website: WebsiteConfig) -> Result<(), PulseError> {
        let mut file = self.read_strict()?;
        if file.websites.iter().any(|existing| existing.name == website.name) {
            return Err(PulseError::Duplicate { kind: ResourceKind::Website, name: website.name });
        }
        Self::stamp(&mut website.created_at);
        file.websites.push(website);
        self.write(&file)
    }

    pub fn add_app(&self, mut app: AppConfig) -> Result<(), PulseError> {
        let mut file = self.read_strict()?;
        if file.apps.iter().any(|existing| existing.name == app.name) {
            return Err(PulseError::Duplicate { kind: ResourceKind::App, name: app.name });
        }
        Self::stamp(&mut app.created_at);
        file.apps.push(app);
        self.write(&file)
    }

    pub fn add_server(&self, mut server: ServerConfig) -> Result<(), PulseError> {
        let mut file = self.read_strict()?;
        if file.servers.iter().any(|existing| existing.name == server.name) {
            return Err(PulseError::Duplicate { kind: ResourceKind::Server, name: server.name });
        }
        Self::stamp(&mut server.created_at);
        file.servers.push(server);
        self.write(&file)
    }

    pub fn remove(&self, kind: ResourceKind, name: &str) -> Result<(), PulseError> {
        let mut file = self.read_strict()?;
        let before = file.websites.len() + file.apps.len() + file.servers.len();
        match kind {
            ResourceKind::Website => file.websites.retain(|entry| entry.name != name),
            ResourceKind::App => file.apps.retain(|entry| entry.name != name),
            ResourceKind::Server => file.servers.retain(|entry| entry.name != name),
        }
        if file.websites.len() + file.apps.len() + file.servers.len() == before {
            return Err(PulseError::NotFound { kind, name: name.to_string() });
        }
        self.write(&file)
    }

    pub fn update_settings(
        &self,
        refresh_interval: Option<u64>,
        failure_threshold: Option<u32>,
    ) -> Result<OverlaySettings, PulseError> {
        let mut file = self.read_strict()?;
        if let Some(refresh_interval) = refresh_interval {
            file.settings.refresh_interval = refresh_interval.max(1);
        }
        if let Some(failure_threshold) = failure_threshold {
            file.settings.failure_threshold = failure_threshold;
        }
        self.write(&file)?;
        Ok(file.settings)
    }
}
