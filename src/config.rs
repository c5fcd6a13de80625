use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_API_BASE;

pub const API_BASE_ENV: &str = "SURGITRACK_API_BASE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub tick_rate_ms: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            tick_rate_ms: 250,
            request_timeout_secs: 30,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Apply environment overrides, looked up through `var` so tests don't
    /// have to mutate the process environment.
    pub fn with_env<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = var(API_BASE_ENV).filter(|b| !b.trim().is_empty()) {
            self.api_base = base;
        }
        self
    }

    pub fn tick_rate(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_rate_ms.max(10))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "surgitrack") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("surgitrack_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            api_base: "https://api.example.test".into(),
            tick_rate_ms: 1000,
            request_timeout_secs: 5,
            log_level: "debug".into(),
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"api_base": "http://10.0.0.2:8000"}"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.api_base, "http://10.0.0.2:8000");
        assert_eq!(cfg.tick_rate_ms, 250);
    }

    #[test]
    fn env_overrides_api_base() {
        let cfg = Config::default().with_env(|k| {
            (k == API_BASE_ENV).then(|| "http://staging.test".to_string())
        });
        assert_eq!(cfg.api_base, "http://staging.test");

        let untouched = Config::default().with_env(|_| Some("   ".into()));
        assert_eq!(untouched.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn tick_rate_has_a_floor() {
        let cfg = Config {
            tick_rate_ms: 0,
            ..Config::default()
        };
        assert_eq!(cfg.tick_rate(), std::time::Duration::from_millis(10));
    }
}
