//! Signed-in state: a bearer token plus the cached profile.
//!
//! [`SessionManager`] is created once per process, restored explicitly on
//! launch and torn down on sign-out. Screens that need the token borrow the
//! current [`Session`] from it instead of reaching for a global.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, SkillsApi};
use crate::models::{Profile, RegisterRequest};

/// Fixed key the token is persisted under.
pub const TOKEN_KEY: &str = "surgitrack_token";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub profile: Option<Profile>,
}

impl Session {
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("could not access the token store: {0}")]
    Store(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing persisted; the user starts signed out.
    NoToken,
    Restored,
    /// A token was found but the server rejected it, so it was dropped.
    Cleared,
}

/// Persistence for the single token string
pub trait TokenStore {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "surgitrack_token")]
    token: String,
}

/// Token file with a fallback location for when the primary one cannot be
/// written (read-only or missing state directory).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    primary: PathBuf,
    fallback: Option<PathBuf>,
}

impl FileTokenStore {
    pub fn new(primary: PathBuf, fallback: Option<PathBuf>) -> Self {
        Self { primary, fallback }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self::new(p.as_ref().to_path_buf(), None)
    }

    fn read(path: &Path) -> io::Result<Option<String>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice::<TokenFile>(&bytes) {
            Ok(file) if !file.token.trim().is_empty() => Ok(Some(file.token)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    fn write(path: &Path, token: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(&TokenFile {
            token: token.to_string(),
        })
        .map_err(io::Error::other)?;
        fs::write(path, data)?;
        restrict_permissions(path)
    }

    fn remove(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        let Some(fallback) = &self.fallback else {
            return Self::read(&self.primary);
        };
        match Self::read(&self.primary) {
            Ok(Some(token)) => Ok(Some(token)),
            Ok(None) => Self::read(fallback),
            Err(e) => {
                warn!(error = %e, "primary token store unreadable, using fallback");
                Self::read(fallback)
            }
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        match (Self::write(&self.primary, token), &self.fallback) {
            (Ok(()), _) => Ok(()),
            (Err(e), Some(fallback)) => {
                warn!(error = %e, "primary token store failed, using fallback");
                Self::write(fallback, token)
            }
            (Err(e), None) => Err(e),
        }
    }

    fn clear(&self) -> io::Result<()> {
        // both copies go, even if the first removal fails
        let primary = Self::remove(&self.primary);
        let fallback = self.fallback.as_deref().map_or(Ok(()), Self::remove);
        primary.and(fallback)
    }
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> io::Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| io::Error::other("token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.slot()? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Owns the current session and its persisted token.
#[derive(Debug)]
pub struct SessionManager<S: TokenStore> {
    store: S,
    session: Option<Session>,
}

impl<S: TokenStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .filter(|s| s.has_token())
            .map(|s| s.token.as_str())
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.session.as_ref().and_then(|s| s.profile.as_ref())
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    /// Launch-time init: adopt the persisted token if the server still
    /// accepts it.
    pub fn restore(&mut self, api: &dyn SkillsApi) -> Result<RestoreOutcome, SessionError> {
        let Some(token) = self.store.load()? else {
            self.session = None;
            return Ok(RestoreOutcome::NoToken);
        };
        match api.profile(&token) {
            Ok(profile) => {
                info!(email = %profile.email, "session restored");
                self.session = Some(Session {
                    token,
                    profile: Some(profile),
                });
                Ok(RestoreOutcome::Restored)
            }
            Err(e) => {
                warn!(error = %e, "failed to load profile, clearing stored token");
                self.store.clear()?;
                self.session = None;
                Ok(RestoreOutcome::Cleared)
            }
        }
    }

    pub fn sign_in(
        &mut self,
        api: &dyn SkillsApi,
        email: &str,
        password: &str,
    ) -> Result<&Session, SessionError> {
        let token = api.login(email, password)?.access_token;
        self.store.save(&token)?;
        self.session = Some(Session {
            token: token.clone(),
            profile: None,
        });
        match api.profile(&token) {
            Ok(profile) => {
                info!(email = %profile.email, "signed in");
                Ok(self.session.insert(Session {
                    token,
                    profile: Some(profile),
                }))
            }
            Err(e) => {
                self.invalidate("profile fetch failed right after login");
                Err(e.into())
            }
        }
    }

    /// Create the account, then sign in with the same credentials.
    pub fn register(
        &mut self,
        api: &dyn SkillsApi,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<&Session, SessionError> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        };
        api.register(&request)?;
        self.sign_in(api, email, password)
    }

    pub fn sign_out(&mut self) -> Result<(), SessionError> {
        self.session = None;
        self.store.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Forced sign-out after the server rejected our token
    pub fn invalidate(&mut self, reason: &str) {
        warn!(reason, "invalidating session");
        self.session = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not clear stored token");
        }
    }

    /// Drop the session when `err` says the token is no longer valid.
    /// Returns whether it did.
    pub fn invalidate_if_stale(&mut self, err: &ApiError) -> bool {
        if err.is_unauthorized() && self.session.is_some() {
            self.invalidate("server rejected the stored token");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_roundtrip_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::with_path(dir.path().join("token.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap(), Some("abc".to_string()));

        let raw = fs::read_to_string(dir.path().join("token.json")).unwrap();
        assert!(raw.contains(TOKEN_KEY));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn file_store_falls_back_when_primary_unwritable() {
        let dir = tempdir().unwrap();
        // a regular file where the parent directory should be
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"x").unwrap();
        let store = FileTokenStore::new(
            blocker.join("token.json"),
            Some(dir.path().join("fallback.json")),
        );

        store.save("tok").unwrap();
        assert!(dir.path().join("fallback.json").exists());
        assert_eq!(store.load().unwrap(), Some("tok".to_string()));
    }

    #[test]
    fn clear_reports_stuck_primary_even_with_fallback() {
        let dir = tempdir().unwrap();
        // a directory cannot be removed as a token file
        let primary = dir.path().join("token.json");
        fs::create_dir(&primary).unwrap();
        let fallback = dir.path().join("fallback.json");
        let store = FileTokenStore::new(primary.clone(), Some(fallback.clone()));
        FileTokenStore::write(&fallback, "tok").unwrap();

        assert!(store.clear().is_err());
        assert!(primary.exists());
        // the fallback copy is still removed
        assert!(!fallback.exists());
    }

    #[test]
    fn garbage_token_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, b"not json").unwrap();
        let store = FileTokenStore::with_path(&path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        FileTokenStore::with_path(&path).save("abc").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        store.save("x").unwrap();
        assert_eq!(store.load().unwrap(), Some("x".into()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn empty_token_is_not_signed_in() {
        let mut manager = SessionManager::new(MemoryTokenStore::new());
        manager.session = Some(Session {
            token: "  ".into(),
            profile: None,
        });
        assert!(!manager.is_signed_in());
        assert_eq!(manager.token(), None);
    }
}
