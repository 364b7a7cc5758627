use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, fs};

use serde::{Deserialize, Serialize};

use crate::error::PulseError;

const APP_DIR: &str = "opsmon";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSection,
    pub stores: StoresSection,
    pub monitor: MonitorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresSection {
    /// Directory holding `monitoring.yaml` and the per-type stores.
    /// Defaults to the configuration directory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Terminal dashboard refresh, seconds
    pub refresh_interval: u64,
    /// Delay between SSE frames, seconds
    pub stream_interval: u64,
    /// TTL of the cached poll snapshot, seconds
    pub poll_cache_ttl: u64,
    /// TTL of the cached resource listing, seconds
    pub listing_cache_ttl: u64,
    /// Upper bound on concurrently running blocking probes
    pub worker_threads: usize,
    /// Extra time granted to a probe past its own timeout before it is abandoned
    pub probe_grace_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            stores: StoresSection::default(),
            monitor: MonitorSection::default(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for StoresSection {
    fn default() -> Self {
        Self { dir: None }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            refresh_interval: 5,
            stream_interval: 10,
            poll_cache_ttl: 30,
            listing_cache_ttl: 300,
            worker_threads: 8,
            probe_grace_ms: 500,
        }
    }
}

impl MonitorSection {
    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval.max(1))
    }

    pub fn poll_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.poll_cache_ttl)
    }

    pub fn listing_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_cache_ttl)
    }

    pub fn probe_grace(&self) -> Duration {
        Duration::from_millis(self.probe_grace_ms)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &Path) -> PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config directory ($XDG_CONFIG_HOME/opsmon or $HOME/.config/opsmon)
pub fn default_config_dir() -> Result<PathBuf, PulseError> {
    let base = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        PathBuf::from(home_dir).join(".config")
    } else {
        return Err(PulseError::ConfigPathUnavailable);
    };

    Ok(base.join(APP_DIR))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        let stores_dir = self
            .stores
            .dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "<config dir>".to_string());

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Stores")?;
        write_1(f, "Directory", &stores_dir)?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Refresh Interval (s)", &self.monitor.refresh_interval)?;
        write_1(f, "Stream Interval (s)", &self.monitor.stream_interval)?;
        write_1(f, "Poll Cache TTL (s)", &self.monitor.poll_cache_ttl)?;
        write_1(f, "Listing Cache TTL (s)", &self.monitor.listing_cache_ttl)?;
        write_1(f, "Worker Threads", &self.monitor.worker_threads)?;
        write_1(f, "Probe Grace (ms)", &self.monitor.probe_grace_ms)?;

        Ok(())
    }
}

impl Settings {
    /// Generate Settings structure from file
    ///
    /// Creates a default config in ~/.config/opsmon/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// let settings = pulse::Settings::from_config(None::<&std::path::Path>)?;
    /// println!("{}", settings);
    /// # Ok::<(), pulse::PulseError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<Path>>) -> Result<Self, PulseError> {
        let config_path: PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_dir()?.join(CONFIG_FILE)
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| PulseError::Read { path: config_path.clone(), source })?;
            let mut settings: Settings = toml::from_str(raw_string.as_str()).map_err(|err| {
                PulseError::Parse { path: config_path.clone(), message: err.to_string() }
            })?;
            settings.anchor_stores_dir(&config_path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.write_config(&config_path)?;
            settings.anchor_stores_dir(&config_path);
            Ok(settings)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &Path) -> Result<(), PulseError> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|err| PulseError::Serialize(err.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| PulseError::Write { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| PulseError::Write { path: path.to_path_buf(), source })
    }

    /// Directory of the YAML stores
    pub fn stores_dir(&self) -> Result<PathBuf, PulseError> {
        match &self.stores.dir {
            Some(dir) => Ok(dir.clone()),
            None => default_config_dir(),
        }
    }

    /// Stores default to living next to the config file that was loaded
    fn anchor_stores_dir(&mut self, config_path: &Path) {
        if self.stores.dir.is_none() {
            self.stores.dir = config_path.parent().map(Path::to_path_buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let settings = Settings::from_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.monitor.refresh_interval, 5);
        assert_eq!(settings.stores_dir().unwrap(), dir.path());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitor]\nstream_interval = 3\n").unwrap();

        let settings = Settings::from_config(Some(&path)).unwrap();
        assert_eq!(settings.monitor.stream_interval, 3);
        assert_eq!(settings.monitor.poll_cache_ttl, 30);
        assert_eq!(settings.server.bind, "0.0.0.0");
    }

    #[test]
    fn test_extension_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opsmon");

        Settings::from_config(Some(&path)).unwrap();
        assert!(dir.path().join("opsmon.toml").exists());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(Settings::from_config(Some(&path)), Err(PulseError::Parse { .. })));
    }
}
