//! Resource descriptors.
//!
//! Plain data describing what to monitor. How each descriptor is probed is
//! decided in [`crate::probe::CheckPlan`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of monitored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Website,
    App,
    Server,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Website, ResourceKind::App, ResourceKind::Server];

    /// Key used for this kind in the stores and JSON payloads
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Website => "websites",
            ResourceKind::App => "apps",
            ResourceKind::Server => "servers",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Website => write!(f, "website"),
            ResourceKind::App => write!(f, "app"),
            ResourceKind::Server => write!(f, "server"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "website" | "websites" => Ok(ResourceKind::Website),
            "app" | "apps" => Ok(ResourceKind::App),
            "server" | "servers" => Ok(ResourceKind::Server),
            other => Err(format!("unknown resource type '{other}' (expected website, app or server)")),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_website_timeout() -> u64 {
    10
}

fn default_ssh_port() -> u16 {
    22
}

/// Website monitored through an HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Request timeout in seconds
    #[serde(default = "default_website_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl WebsiteConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: default_method(),
            expected_status: default_expected_status(),
            timeout: default_website_timeout(),
            headers: BTreeMap::new(),
            enabled: true,
            created_at: None,
        }
    }
}

/// How an application is checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppKind {
    Docker,
    Pm2,
    Process,
    Http,
    Port,
    Command,
    /// Kept verbatim so listings show what was configured; never probed
    Other(String),
}

impl AppKind {
    pub const SUPPORTED: [&'static str; 6] = ["docker", "pm2", "process", "http", "port", "command"];
}

impl From<String> for AppKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "docker" => AppKind::Docker,
            "pm2" => AppKind::Pm2,
            "process" => AppKind::Process,
            "http" => AppKind::Http,
            "port" | "tcp" => AppKind::Port,
            "command" => AppKind::Command,
            _ => AppKind::Other(value),
        }
    }
}

impl From<AppKind> for String {
    fn from(value: AppKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppKind::Docker => write!(f, "docker"),
            AppKind::Pm2 => write!(f, "pm2"),
            AppKind::Process => write!(f, "process"),
            AppKind::Http => write!(f, "http"),
            AppKind::Port => write!(f, "port"),
            AppKind::Command => write!(f, "command"),
            AppKind::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// Deployed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AppKind,
    /// Container name, pm2 process name or process pattern
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Path (`/health`) or absolute URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl AppConfig {
    pub fn new(name: impl Into<String>, kind: AppKind, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            identifier: identifier.into(),
            host: None,
            port: None,
            health_endpoint: None,
            command: None,
            timeout: None,
            enabled: true,
            created_at: None,
        }
    }
}

/// How a server is checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerCheck {
    #[default]
    Ping,
    Ssh,
    Http,
    Port,
    Other(String),
}

impl ServerCheck {
    pub const SUPPORTED: [&'static str; 4] = ["ping", "ssh", "http", "port"];
}

impl From<String> for ServerCheck {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "ping" => ServerCheck::Ping,
            "ssh" => ServerCheck::Ssh,
            "http" => ServerCheck::Http,
            "port" | "tcp" => ServerCheck::Port,
            _ => ServerCheck::Other(value),
        }
    }
}

impl From<ServerCheck> for String {
    fn from(value: ServerCheck) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ServerCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerCheck::Ping => write!(f, "ping"),
            ServerCheck::Ssh => write!(f, "ssh"),
            ServerCheck::Http => write!(f, "http"),
            ServerCheck::Port => write!(f, "port"),
            ServerCheck::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// Server reachable over the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub check_type: ServerCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_ssh_port(),
            check_type: ServerCheck::default(),
            http_endpoint: None,
            ssh_user: None,
            timeout: None,
            enabled: true,
            created_at: None,
        }
    }
}

/// Any monitored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    Website(WebsiteConfig),
    App(AppConfig),
    Server(ServerConfig),
}

impl ResourceDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ResourceDescriptor::Website(w) => &w.name,
            ResourceDescriptor::App(a) => &a.name,
            ResourceDescriptor::Server(s) => &s.name,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::Website(_) => ResourceKind::Website,
            ResourceDescriptor::App(_) => ResourceKind::App,
            ResourceDescriptor::Server(_) => ResourceKind::Server,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            ResourceDescriptor::Website(w) => w.enabled,
            ResourceDescriptor::App(a) => a.enabled,
            ResourceDescriptor::Server(s) => s.enabled,
        }
    }
}

/// Per-type descriptor lists, in resolution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    #[serde(default)]
    pub websites: Vec<WebsiteConfig>,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ResourceSet {
    pub fn len(&self) -> usize {
        self.websites.len() + self.apps.len() + self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Website => self.websites.len(),
            ResourceKind::App => self.apps.len(),
            ResourceKind::Server => self.servers.len(),
        }
    }

    /// Flatten into descriptors, websites first
    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        self.websites
            .iter()
            .cloned()
            .map(ResourceDescriptor::Website)
            .chain(self.apps.iter().cloned().map(ResourceDescriptor::App))
            .chain(self.servers.iter().cloned().map(ResourceDescriptor::Server))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_defaults() {
        let website: WebsiteConfig = serde_yaml::from_str("name: main\nurl: https://example.com\n").unwrap();
        assert_eq!(website.method, "GET");
        assert_eq!(website.expected_status, 200);
        assert_eq!(website.timeout, 10);
        assert!(website.enabled);
        assert!(website.created_at.is_none());
    }

    #[test]
    fn test_app_kind_keeps_unknown_types() {
        let app: AppConfig = serde_yaml::from_str("name: fn\ntype: lambda\nidentifier: handler\n").unwrap();
        assert_eq!(app.kind, AppKind::Other("lambda".to_string()));

        let yaml = serde_yaml::to_string(&app).unwrap();
        assert!(yaml.contains("type: lambda"));
    }

    #[test]
    fn test_server_check_aliases() {
        assert_eq!(ServerCheck::from("TCP".to_string()), ServerCheck::Port);
        assert_eq!(ServerCheck::from("ssh".to_string()), ServerCheck::Ssh);
        assert_eq!(AppKind::from("tcp".to_string()), AppKind::Port);
    }

    #[test]
    fn test_resource_kind_parsing() {
        assert_eq!("apps".parse::<ResourceKind>(), Ok(ResourceKind::App));
        assert_eq!("Website".parse::<ResourceKind>(), Ok(ResourceKind::Website));
        assert!("database".parse::<ResourceKind>().is_err());
    }
}
