//! Persistence of the authenticated profile across restarts
//!
//! The profile is stored as JSON under a single well-known key. Data that
//! cannot be parsed is removed and treated as "no session".

use crate::error::{StationError, StationResult};
use crate::model::UserProfile;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key the profile is stored under
pub const SESSION_KEY: &str = "warehouse_user";

/// Storage for the authenticated profile
pub trait SessionStore: Send + Sync {
    /// Load the stored profile. Corrupt data is cleared and yields `None`.
    fn load(&self) -> StationResult<Option<UserProfile>>;

    /// Persist the profile, replacing any previous one
    fn save(&self, profile: &UserProfile) -> StationResult<()>;

    /// Remove the stored profile. Clearing an empty store is not an error.
    fn clear(&self) -> StationResult<()>;
}

/// File-backed store: `<dir>/warehouse_user.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the session file inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", SESSION_KEY)),
        }
    }

    /// Path of the session file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> StationResult<Option<UserProfile>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StationError::from(e)),
        };

        match serde_json::from_str::<UserProfile>(&raw) {
            Ok(profile) => {
                debug!("Restored session for {}", profile.username);
                Ok(Some(profile))
            }
            Err(e) => {
                warn!("Discarding unreadable session at {}: {}", self.path.display(), e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn save(&self, profile: &UserProfile) -> StationResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> StationResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StationError::SessionStore {
                reason: format!("failed to remove {}: {}", self.path.display(), e),
            }),
        }
    }
}

/// In-memory store holding the raw JSON, for tests and ephemeral stations
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw contents (possibly corrupt)
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Whether anything is stored
    pub fn is_empty(&self) -> bool {
        self.raw.lock().is_none()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> StationResult<Option<UserProfile>> {
        let mut raw = self.raw.lock();
        let Some(contents) = raw.as_deref() else {
            return Ok(None);
        };
        match serde_json::from_str::<UserProfile>(contents) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!("Discarding unreadable in-memory session: {}", e);
                *raw = None;
                Ok(None)
            }
        }
    }

    fn save(&self, profile: &UserProfile) -> StationResult<()> {
        *self.raw.lock() = Some(serde_json::to_string(profile)?);
        Ok(())
    }

    fn clear(&self) -> StationResult<()> {
        *self.raw.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn profile() -> UserProfile {
        UserProfile {
            id: "1".to_string(),
            username: "operator001".to_string(),
            email: "operator@warehouse.com".to_string(),
            role: Role::Operator,
            station_id: Some("A1".to_string()),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            avatar: None,
        }
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        store.save(&profile()).unwrap();
        assert!(store.path().ends_with("warehouse_user.json"));
        assert_eq!(store.load().unwrap(), Some(profile()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Second clear is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_discards_corrupt_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_memory_store_discards_corrupt_data() {
        let store = MemorySessionStore::with_raw("garbage");
        assert!(!store.is_empty());
        assert!(store.load().unwrap().is_none());
        assert!(store.is_empty());

        store.save(&profile()).unwrap();
        assert_eq!(store.load().unwrap().map(|p| p.role), Some(Role::Operator));
    }
}
