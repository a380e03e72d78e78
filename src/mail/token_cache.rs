use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tokens this close to expiry are treated as already expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_in_secs: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now(),
            None => true,
        }
    }
}

/// Storage for the mail API access token
pub trait TokenCache: Send + Sync {
    /// The cached token, if one exists and has not expired
    fn get(&self) -> Option<CachedToken>;

    /// Replace the cached token
    fn set(&self, token: CachedToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Forget the cached token
    fn clear(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Default)]
pub struct MemoryTokenCache {
    token: Mutex<Option<CachedToken>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for MemoryTokenCache {
    fn get(&self) -> Option<CachedToken> {
        let guard = self.token.lock().ok()?;
        guard.as_ref().filter(|t| t.is_valid()).cloned()
    }

    fn set(&self, token: CachedToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| "token cache lock poisoned".to_string())?;
        *guard = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| "token cache lock poisoned".to_string())?;
        *guard = None;
        Ok(())
    }
}

/// Token persisted as JSON so a device-code login survives restarts.
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.cache/mail2crm/graph_token.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join("mail2crm"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("graph_token.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenCache for FileTokenCache {
    fn get(&self) -> Option<CachedToken> {
        let content = fs::read_to_string(&self.path).ok()?;
        let token: CachedToken = match serde_json::from_str(&content) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable token cache");
                return None;
            }
        };
        token.is_valid().then_some(token)
    }

    fn set(&self, token: CachedToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&token)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
