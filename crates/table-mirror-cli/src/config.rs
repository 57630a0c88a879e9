use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use table_mirror::{CollectionName, MirrorConfig};
use table_mirror_supabase::SupabaseConfig;

/// Environment variable holding the Supabase project URL.
pub const URL_ENV: &str = "SUPABASE_URL";
/// Environment variable holding the Supabase service-role key.
pub const KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<MirrorEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            server: ServerConfig::default(),
            mirrors: default_mirrors(),
        }
    }
}

/// Where the remote tables live. Credentials usually come from the
/// environment rather than the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// One mirrored set of collections, written to its own snapshot file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorEntry {
    pub label: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Snapshot file; defaults to `<data dir>/table-mirror/<label>_cache.json`.
    pub path: Option<PathBuf>,
    pub collections: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl MirrorEntry {
    pub fn snapshot_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir().ok_or_else(|| ConfigError::NoDataDir {
            label: self.label.clone(),
        })?;
        Ok(base
            .join("table-mirror")
            .join(format!("{}_cache.json", self.label)))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            label: self.label.clone(),
            collections: self
                .collections
                .iter()
                .map(|c| CollectionName::new(c.as_str()))
                .collect(),
            interval: self.interval(),
        }
    }
}

/// Problems that stop the mirror from starting at all.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("remote URL is not configured: set SUPABASE_URL or [remote].url")]
    MissingUrl,

    #[error("service key is not configured: set SUPABASE_SERVICE_ROLE_KEY or [remote].service_key")]
    MissingKey,

    #[error("no enabled mirrors configured")]
    NoMirrors,

    #[error("mirror label {0:?} is used more than once")]
    DuplicateLabel(String),

    #[error("mirrors [{first}] and [{second}] both write {}", path.display())]
    DuplicatePath {
        first: String,
        second: String,
        path: PathBuf,
    },

    #[error("no mirror named {0:?}")]
    UnknownLabel(String),

    #[error("mirror [{label}] has no path and no data directory could be determined")]
    NoDataDir { label: String },
}

impl AppConfig {
    /// Enabled mirrors, in file order. Fails if there are none, two share a
    /// label, or two enabled mirrors would write the same snapshot file.
    pub fn enabled_mirrors(&self) -> Result<Vec<&MirrorEntry>, ConfigError> {
        let mut labels = HashSet::new();
        let mut paths: HashMap<PathBuf, &str> = HashMap::new();
        let mut enabled = Vec::new();

        for entry in &self.mirrors {
            if !labels.insert(entry.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(entry.label.clone()));
            }
            if !entry.enabled {
                continue;
            }

            let path = entry.snapshot_path()?;
            if let Some(first) = paths.get(&path) {
                return Err(ConfigError::DuplicatePath {
                    first: (*first).to_owned(),
                    second: entry.label.clone(),
                    path,
                });
            }
            paths.insert(path, entry.label.as_str());
            enabled.push(entry);
        }

        if enabled.is_empty() {
            return Err(ConfigError::NoMirrors);
        }
        Ok(enabled)
    }

    /// Enabled mirrors narrowed to `label` when one is given.
    pub fn select_mirrors(&self, label: Option<&str>) -> Result<Vec<&MirrorEntry>, ConfigError> {
        let enabled = self.enabled_mirrors()?;
        match label {
            None => Ok(enabled),
            Some(label) => {
                let selected: Vec<_> = enabled.into_iter().filter(|m| m.label == label).collect();
                if selected.is_empty() {
                    return Err(ConfigError::UnknownLabel(label.to_owned()));
                }
                Ok(selected)
            }
        }
    }

    /// Build the remote connection settings. Environment values (looked up
    /// through `env`) take precedence over the config file.
    pub fn supabase_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<SupabaseConfig, ConfigError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let url = non_empty(env(URL_ENV))
            .or_else(|| non_empty(self.remote.url.clone()))
            .ok_or(ConfigError::MissingUrl)?;
        let service_key = non_empty(env(KEY_ENV))
            .or_else(|| non_empty(self.remote.service_key.clone()))
            .ok_or(ConfigError::MissingKey)?;

        Ok(SupabaseConfig {
            url,
            service_key,
            timeout: Duration::from_secs(self.remote.timeout_secs),
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    300
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}

/// Built-in mirror: the four core tables every five minutes.
pub fn default_mirrors() -> Vec<MirrorEntry> {
    vec![MirrorEntry {
        label: "supabase".into(),
        enabled: true,
        path: None,
        collections: ["blueprint", "memory", "logs", "agents"]
            .into_iter()
            .map(String::from)
            .collect(),
        interval_secs: default_interval_secs(),
    }]
}

/// Config file path: `~/.config/table-mirror/mirror.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("table-mirror").join("mirror.toml"))
}

/// Load config from `explicit`, or from the default location if it
/// exists, or fall back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}
