//! Persisted login state: a `token` string and a JSON-encoded `user`.

use kb_core::{Error, Result, User};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Minimal string key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write all entries at once.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<()>;

    fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Session("session lock poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut map = lock(&self.entries)?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = lock(&self.entries)?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A JSON object on disk. Writes go through a temp file and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        match serde_json::from_str(&text) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("Session file {} is unreadable ({}), starting empty", self.path.display(), e);
                Ok(HashMap::new())
            }
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.guard)?;
        Ok(self.load()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut map = self.load()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        self.persist(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut map = self.load()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before && !self.path.exists() {
            return Ok(());
        }
        self.persist(&map)
    }
}

/// Typed view over a [`KeyValueStore`]. Clones share the store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &"<dyn KeyValueStore>")
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    /// The persisted token. Storage failures read as "no token".
    pub fn token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read session token: {}", e);
                None
            }
        }
    }

    /// The persisted user. A corrupt entry wipes the whole session.
    pub fn user(&self) -> Option<User> {
        let raw = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read session user: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Stored user is corrupt ({}), clearing session", e);
                if let Err(e) = self.clear() {
                    warn!("Could not clear session: {}", e);
                }
                None
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn save(&self, token: &str, user: &User) -> Result<()> {
        self.store.set_many(&[
            (TOKEN_KEY, token.to_string()),
            (USER_KEY, serde_json::to_string(user)?),
        ])?;
        info!("🔐 Session saved for {}", user.email);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove_many(&[TOKEN_KEY, USER_KEY])?;
        debug!("Session cleared");
        Ok(())
    }

    /// Raw access for callers that seed or inspect the store directly.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: "user".to_string(),
            avatar: None,
            created_at: None,
        }
    }

    #[test]
    fn test_save_and_read_back() {
        let session = Session::in_memory();
        assert!(!session.is_logged_in());
        session.save("abc123", &user()).unwrap();
        assert_eq!(session.token().as_deref(), Some("abc123"));
        assert_eq!(session.user(), Some(user()));
    }

    #[test]
    fn test_corrupt_user_clears_both_keys() {
        let session = Session::in_memory();
        session
            .store()
            .set_many(&[(TOKEN_KEY, "abc123".to_string()), (USER_KEY, "{not json".to_string())])
            .unwrap();
        assert!(session.user().is_none());
        assert!(session.token().is_none());
        assert!(session.store().get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        Session::file(&path).save("tok", &user()).unwrap();

        let reopened = Session::file(&path);
        assert_eq!(reopened.token().as_deref(), Some("tok"));
        assert_eq!(reopened.user().map(|u| u.id), Some(7));

        reopened.clear().unwrap();
        assert!(Session::file(&path).token().is_none());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_tolerates_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "definitely not json").unwrap();
        let session = Session::file(&path);
        assert!(session.token().is_none());
        session.save("fresh", &user()).unwrap();
        assert_eq!(session.token().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_clear_without_file_does_not_create_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        Session::file(&path).clear().unwrap();
        assert!(!path.exists());
    }
}
