//! On-disk token cache
//!
//! Stores the credential as a versioned JSON record. Anything that does not
//! parse as a current record is treated as an empty cache.

use crate::{AuthError, AuthResult, Credential};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current on-disk record version
const CACHE_VERSION: u32 = 1;

#[derive(Serialize)]
struct CacheRecordRef<'a> {
    version: u32,
    credential: &'a Credential,
}

#[derive(Deserialize)]
struct CacheRecord {
    version: u32,
    credential: Credential,
}

/// File-backed cache holding a single credential
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Create a cache at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential
    ///
    /// A missing, unreadable or malformed file yields `None`.
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring malformed token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if record.version != CACHE_VERSION {
            warn!(
                "Ignoring token cache {} with unsupported version {}",
                self.path.display(),
                record.version
            );
            return None;
        }

        if record.credential.access_token.is_empty() {
            warn!("Ignoring token cache {} without access token", self.path.display());
            return None;
        }

        debug!(
            "Loaded cached credential from {} (expires_at={:?})",
            self.path.display(),
            record.credential.expires_at
        );
        Some(record.credential)
    }

    /// Persist a credential, replacing any previous cache file
    pub fn store(&self, credential: &Credential) -> AuthResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::CacheError(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let record = CacheRecordRef {
            version: CACHE_VERSION,
            credential,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| AuthError::CacheError(format!("Failed to serialize credential: {}", e)))?;

        // Write beside the target and rename over it so readers never see a partial file
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json).map_err(|e| {
            AuthError::CacheError(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        restrict_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            AuthError::CacheError(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!("Stored credential in {}", self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AuthResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        AuthError::CacheError(format!(
            "Failed to set permissions on {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AuthResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            access_token: "ya29.cached".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(1_900_000_000),
            scopes: vec!["https://www.googleapis.com/auth/gmail.send".to_string()],
        }
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("nested").join("token.json"));

        cache.store(&sample()).unwrap();
        assert_eq!(cache.load(), Some(sample()));
        assert!(!dir.path().join("nested").join("token.json.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_malformed_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"\x80\x04\x95 not json").unwrap();
        assert!(TokenCache::new(&path).load().is_none());
    }

    #[test]
    fn test_unknown_version_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"version": 7, "credential": {"access_token": "ya29.x"}}"#,
        )
        .unwrap();
        assert!(TokenCache::new(&path).load().is_none());
    }

    #[test]
    fn test_empty_access_token_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"version": 1, "credential": {"access_token": ""}}"#).unwrap();
        assert!(TokenCache::new(&path).load().is_none());
    }

    #[test]
    fn test_store_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        cache.store(&sample()).unwrap();

        let mut updated = sample();
        updated.access_token = "ya29.newer".to_string();
        cache.store(&updated).unwrap();

        assert_eq!(cache.load().unwrap().access_token, "ya29.newer");
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        cache.store(&sample()).unwrap();

        let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
