//! Persisted runtime settings.
//!
//! Components and widgets may stash small amounts of state (scroll
//! positions, last-used values) in a string-keyed JSON map that survives
//! across sessions. The scheduler loads it on start and saves it on stop
//! when modified. Load/save failures are diagnostics only: the runtime logs
//! them and keeps defaults.
//!
//! The file-backed store writes a sidecar next to the project file,
//! `<project_file_path>-runtime-settings`, using a temp-file-then-rename
//! write so a crash never leaves a truncated file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::errors::SettingsError;
use crate::traits::SettingsStore;

/// Key → JSON settings map as stored in the sidecar.
pub type SettingsMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// Runtime-side state
// ---------------------------------------------------------------------------

/// In-memory settings with a modified flag so unchanged settings are not
/// rewritten at every stop.
#[derive(Debug, Default)]
pub struct RuntimeSettings {
    values: SettingsMap,
    modified: bool,
}

impl RuntimeSettings {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
        self.modified = true;
    }

    /// Replace everything with a freshly loaded map; clears the flag.
    pub fn replace_all(&mut self, values: SettingsMap) {
        self.values = values;
        self.modified = false;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn values(&self) -> &SettingsMap {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Sidecar-file store for runtime settings.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional sidecar path for a project file:
    /// `<project_file_path>-runtime-settings`.
    pub fn for_project_file(project_path: impl AsRef<Path>) -> Self {
        let mut os = project_path.as_ref().as_os_str().to_os_string();
        os.push("-runtime-settings");
        Self {
            path: PathBuf::from(os),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Atomic write: serialize to temp file, then rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), SettingsError> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, data).map_err(|e| SettingsError::Store {
        message: format!("failed to write temp file: {e}"),
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| SettingsError::Store {
        message: format!("failed to rename temp file: {e}"),
    })?;
    Ok(())
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Option<SettingsMap>, SettingsError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&self.path).map_err(|e| SettingsError::Store {
            message: format!("failed to read settings file: {e}"),
        })?;
        let map = serde_json::from_slice(&data).map_err(|e| SettingsError::Store {
            message: format!("failed to parse settings file: {e}"),
        })?;
        Ok(Some(map))
    }

    async fn save(&self, settings: &SettingsMap) -> Result<(), SettingsError> {
        let data = serde_json::to_vec_pretty(settings).map_err(|e| SettingsError::Store {
            message: format!("failed to serialize settings: {e}"),
        })?;
        atomic_write(&self.path, &data)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Settings store that never touches disk. The default when no project file
/// path is configured; also the natural choice in tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Option<SettingsMap>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<SettingsMap>, SettingsError> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, settings: &SettingsMap) -> Result<(), SettingsError> {
        *self.inner.lock() = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert("page.main.scroll".into(), json!(120));
        map.insert("input.name".into(), json!("probe-7"));
        map
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("demo.wf-project");
        let store = FileSettingsStore::for_project_file(&project);
        assert!(store
            .path()
            .to_string_lossy()
            .ends_with("demo.wf-project-runtime-settings"));

        store.save(&sample()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.get("page.main.scroll"), Some(&json!(120)));
    }

    #[tokio::test]
    async fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("absent"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = FileSettingsStore::new(&path);
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings");
        let store = FileSettingsStore::new(&path);
        store.save(&sample()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["settings".to_string()]);
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySettingsStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&sample()).await.unwrap();
        assert_eq!(
            store.load().await.unwrap().unwrap().get("input.name"),
            Some(&json!("probe-7"))
        );
    }

    #[test]
    fn modified_flag_tracks_writes() {
        let mut settings = RuntimeSettings::default();
        assert!(!settings.is_modified());

        settings.set("k", json!(1));
        assert!(settings.is_modified());
        assert_eq!(settings.get("k"), Some(json!(1)));

        settings.mark_saved();
        assert!(!settings.is_modified());

        settings.replace_all(sample());
        assert!(!settings.is_modified());
        assert_eq!(settings.get("input.name"), Some(json!("probe-7")));
    }
}
