use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{Category, Goal, Planner, Task, Theme};
use crate::error::StorageError;

pub const DEFAULT_STORAGE_KEY: &str = "study-planner-data";

/// Key-value medium holding one string blob per key.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`. Writes go to `<key>.json.tmp`
/// first and are renamed into place, so a reader never sees a partial blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.tmp"))
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)?;
        }
        let temp_path = self.temp_path_for(key);
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, self.path_for(key))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, String>,
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn decode_planner(raw: &str) -> Result<Planner, StorageError> {
    let mut planner: Planner =
        serde_json::from_str(raw).map_err(StorageError::MalformedPersistedState)?;
    planner.ensure_sentinel();
    Ok(planner)
}

/// Reads the planner once at startup. A missing, empty, or unreadable
/// document yields the default planner; only I/O failures are errors.
pub fn load_planner(store: &dyn BlobStore, key: &str) -> Result<Planner, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(Planner::new());
    };

    if raw.trim().is_empty() {
        return Ok(Planner::new());
    }

    match decode_planner(&raw) {
        Ok(planner) => Ok(planner),
        Err(err) => {
            warn!(key, error = %err, "stored planner data is malformed, starting from defaults");
            Ok(Planner::new())
        }
    }
}

pub fn save_planner(store: &mut dyn BlobStore, key: &str, planner: &Planner) -> Result<(), StorageError> {
    let blob = serde_json::to_string(planner).map_err(StorageError::Encode)?;
    store.set(key, &blob)
}

pub fn export_json(planner: &Planner) -> Result<String, StorageError> {
    serde_json::to_string_pretty(planner).map_err(StorageError::Encode)
}

pub fn export_to_file(path: &Path, planner: &Planner) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, export_json(planner)?)?;
    info!(path = %path.display(), "exported planner");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    tasks: Option<Vec<Task>>,
    categories: Option<Vec<Category>>,
    goals: Option<Vec<Goal>>,
    theme: Option<Theme>,
}

/// Replaces each collection present in `raw` wholesale and leaves absent
/// ones alone. The document is fully parsed before anything is touched, so
/// a malformed file never changes the planner. Returns the replaced keys.
pub fn import_json(planner: &mut Planner, raw: &str) -> Result<Vec<&'static str>, StorageError> {
    let document: ImportDocument = serde_json::from_str(raw).map_err(StorageError::MalformedImport)?;
    let mut replaced = Vec::new();

    if let Some(tasks) = document.tasks {
        planner.tasks = tasks;
        replaced.push("tasks");
    }
    if let Some(categories) = document.categories {
        planner.categories = categories;
        replaced.push("categories");
    }
    if let Some(goals) = document.goals {
        planner.goals = goals;
        replaced.push("goals");
    }
    if let Some(theme) = document.theme {
        planner.theme = theme;
        replaced.push("theme");
    }
    planner.ensure_sentinel();

    info!(replaced = ?replaced, "imported planner data");
    Ok(replaced)
}
