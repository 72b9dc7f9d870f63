//! Key/value backends for the session store.

use super::SessionError;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

pub trait Storage: Send + Sync {
    /// # Errors
    /// Returns `SessionError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// # Errors
    /// Returns `SessionError` if the backend cannot be written.
    fn set(&self, key: &str, value: String) -> Result<(), SessionError>;

    /// Returns the removed value, if any.
    ///
    /// # Errors
    /// Returns `SessionError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<Option<String>, SessionError>;
}

/// Process-local storage, gone on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(entries.remove(key))
    }
}

/// A JSON object on disk. Every write goes to a sibling temp file that is
/// then renamed over the original, so readers see old or new content only.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(SessionError::Io(err)),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        let _guard = self.lock.lock().map_err(|_| SessionError::Poisoned)?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock().map_err(|_| SessionError::Poisoned)?;
        let mut entries = self.read_all()?;
        let removed = entries.remove(key);
        if removed.is_some() {
            self.write_all(&entries)?;
        }
        Ok(removed)
    }
}
