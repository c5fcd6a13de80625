use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("surgitrack"),
            )
        } else {
            ProjectDirs::from("", "", "surgitrack").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    /// Primary token location
    pub fn token_path() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("token.json"))
            .unwrap_or_else(|| PathBuf::from("surgitrack_token.json"))
    }

    /// Used when the primary location cannot be written
    pub fn token_fallback_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "surgitrack")
            .map(|pd| pd.cache_dir().join("token.json"))
            .filter(|p| *p != Self::token_path())
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("surgitrack.log"))
            .unwrap_or_else(|| PathBuf::from("surgitrack.log"))
    }
}
