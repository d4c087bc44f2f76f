use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::error::{CidashError, Result};
use crate::model::PipelineId;

const PINNED_PIPELINES_KEY: &str = "pinned_pipelines";

/// Small string key-value storage that lives for a dashboard session.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Session storage backed by a single JSON object file.
///
/// Defaults to `<cache dir>/cidash/session.json`:
/// - Linux: `~/.cache/cidash/session.json`
/// - macOS: `~/Library/Caches/cidash/session.json`
pub struct SessionFileStore {
    path: PathBuf,
}

impl SessionFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined.
    pub fn in_cache_dir() -> Result<Self> {
        let path = dirs::cache_dir()
            .ok_or_else(|| CidashError::Storage("No cache directory found".into()))?
            .join("cidash")
            .join("session.json");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeyValueStore for SessionFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // A corrupt session file is replaced rather than blocking writes
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(&entries)?)?;

        debug!("Saved session key {key} to {}", self.path.display());
        Ok(())
    }
}

/// In-process storage, gone when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CidashError::Storage("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CidashError::Storage("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persists the pipelines a user pinned to the top of the list.
///
/// Pinning only affects sort order, so every storage problem is logged and
/// treated as "nothing pinned".
#[derive(Clone)]
pub struct PinStore {
    store: Arc<dyn KeyValueStore>,
}

impl PinStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Vec<PipelineId> {
        let raw = match self.store.get(PINNED_PIPELINES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read pinned pipelines, starting with none: {e}");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!("Ignoring malformed pinned pipelines: {e}");
            Vec::new()
        })
    }

    pub fn save(&self, pinned: &[PipelineId]) {
        let result = serde_json::to_string(pinned)
            .map_err(CidashError::from)
            .and_then(|raw| self.store.set(PINNED_PIPELINES_KEY, &raw));

        if let Err(e) = result {
            warn!("Failed to save pinned pipelines: {e}");
        }
    }
}
