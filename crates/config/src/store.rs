//! Named configuration persistence.
//!
//! A saved configuration is a [`Settings`] record identified by the mode it
//! belongs to and an id. Loading and saving are plain key/value operations:
//! saving the same record twice leaves the store in the same state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::{ConfigError, Settings};

/// Key/value storage for named configurations.
pub trait ConfigStore: Send + Sync {
    /// Load the configuration saved under `(mode, id)`.
    fn load(&self, mode: &str, id: &str) -> Result<Option<Settings>, ConfigError>;

    /// Save (create or overwrite) a configuration.
    fn save(&self, mode: &str, id: &str, settings: &Settings) -> Result<(), ConfigError>;

    /// List saved ids for a mode, sorted.
    fn list(&self, mode: &str) -> Result<Vec<String>, ConfigError>;

    /// Delete a configuration. Returns whether one existed.
    fn delete(&self, mode: &str, id: &str) -> Result<bool, ConfigError>;
}

/// Reject names that could escape the store directory.
fn check_name(kind: &str, name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "invalid {kind} '{name}': use letters, digits, '-' or '_'"
        )))
    }
}

/// On-disk form of one saved configuration.
#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    mode: String,
    id: String,
    #[serde(default)]
    settings: Settings,
}

/// Stores each configuration as `<root>/<mode>/<id>.toml`.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    root: PathBuf,
}

impl FileConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, mode: &str, id: &str) -> Result<PathBuf, ConfigError> {
        check_name("mode", mode)?;
        check_name("id", id)?;
        Ok(self.root.join(mode).join(format!("{id}.toml")))
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, mode: &str, id: &str) -> Result<Option<Settings>, ConfigError> {
        let path = self.path_for(mode, id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let stored: StoredConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(mode, id, keys = stored.settings.len(), "Loaded saved configuration");
        Ok(Some(stored.settings))
    }

    fn save(&self, mode: &str, id: &str, settings: &Settings) -> Result<(), ConfigError> {
        let path = self.path_for(mode, id)?;
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.clone(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let stored = StoredConfig {
            mode: mode.to_string(),
            id: id.to_string(),
            settings: settings.clone(),
        };
        let content = toml::to_string_pretty(&stored).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(write_err)?;

        debug!(mode, id, path = %path.display(), "Saved configuration");
        Ok(())
    }

    fn list(&self, mode: &str) -> Result<Vec<String>, ConfigError> {
        check_name("mode", mode)?;
        let dir = self.root.join(mode);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ConfigError::ReadError {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, mode: &str, id: &str) -> Result<bool, ConfigError> {
        let path = self.path_for(mode, id)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }
}

/// In-process store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: Mutex<BTreeMap<(String, String), Settings>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Settings>> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the map itself is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, mode: &str, id: &str) -> Result<Option<Settings>, ConfigError> {
        Ok(self.entries().get(&(mode.to_string(), id.to_string())).cloned())
    }

    fn save(&self, mode: &str, id: &str, settings: &Settings) -> Result<(), ConfigError> {
        check_name("mode", mode)?;
        check_name("id", id)?;
        self.entries()
            .insert((mode.to_string(), id.to_string()), settings.clone());
        Ok(())
    }

    fn list(&self, mode: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .entries()
            .keys()
            .filter(|(m, _)| m == mode)
            .map(|(_, id)| id.clone())
            .collect())
    }

    fn delete(&self, mode: &str, id: &str) -> Result<bool, ConfigError> {
        Ok(self
            .entries()
            .remove(&(mode.to_string(), id.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings::new()
            .with("max_steps", 8u32)
            .with("tools.shell", true)
            .with("system_prompt", "Be brief.")
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());

        assert!(store.load("standard", "nightly").unwrap().is_none());
        store.save("standard", "nightly", &sample()).unwrap();

        let loaded = store.load("standard", "nightly").unwrap().unwrap();
        assert_eq!(loaded, sample());
        assert!(dir.path().join("standard").join("nightly.toml").exists());
    }

    #[test]
    fn file_store_save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());

        store.save("flow", "review", &sample()).unwrap();
        let first = std::fs::read_to_string(dir.path().join("flow/review.toml")).unwrap();
        store.save("flow", "review", &sample()).unwrap();
        let second = std::fs::read_to_string(dir.path().join("flow/review.toml")).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list("flow").unwrap(), vec!["review"]);
    }

    #[test]
    fn file_store_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        store.save("chat", "b", &Settings::new()).unwrap();
        store.save("chat", "a", &Settings::new()).unwrap();

        assert_eq!(store.list("chat").unwrap(), vec!["a", "b"]);
        assert!(store.list("coder").unwrap().is_empty());

        assert!(store.delete("chat", "a").unwrap());
        assert!(!store.delete("chat", "a").unwrap());
        assert_eq!(store.list("chat").unwrap(), vec!["b"]);
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        assert!(store.save("../etc", "x", &Settings::new()).is_err());
        assert!(store.load("chat", "../../passwd").is_err());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryConfigStore::new();
        store.save("standard", "one", &sample()).unwrap();
        store.save("standard", "one", &sample()).unwrap();
        assert_eq!(store.list("standard").unwrap(), vec!["one"]);
        assert_eq!(store.load("standard", "one").unwrap(), Some(sample()));
        assert!(store.delete("standard", "one").unwrap());
        assert!(store.load("standard", "one").unwrap().is_none());
    }
}
