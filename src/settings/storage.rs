//! String key-value store persisted as one JSON object.
//!
//! Holds the serialized settings blob and small flags such as the update
//! banner dismissal time. Every write rewrites the whole file atomically.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum storage file size (4 MB).
const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access storage file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct LocalStorage {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Opens the store at `path`.
    ///
    /// A missing file starts empty. A file that is oversized, not JSON, or
    /// not an object of strings is logged and ignored rather than failing
    /// startup; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match std::fs::metadata(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                tracing::warn!(
                    path = %path.display(),
                    size = meta.len(),
                    "Storage file too large, starting empty"
                );
                BTreeMap::new()
            }
            Ok(_) => {
                let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_values(&content, &path)
            }
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened local storage");
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.into());
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&self.values)?;
        atomic_write(path, &json).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })
    }
}

fn parse_values(content: &str, path: &Path) -> BTreeMap<String, String> {
    if content.trim().is_empty() {
        return BTreeMap::new();
    }
    match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(content) {
        Ok(raw) => raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) => Some((key, s)),
                other => {
                    tracing::warn!(key = %key, kind = %json_kind(&other), "Dropping non-string storage value");
                    None
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Storage file is not a JSON object, starting empty");
            BTreeMap::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Writes `bytes` to `dst` through a uniquely named temp file, fsync and rename,
/// so `dst` is never left half-written.
pub fn atomic_write(dst: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", suffix));

    let result = (|| {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fluxread_storage_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_set_persists_across_open() {
        let dir = temp_dir("persist");
        let path = dir.join("storage.json");

        let mut store = LocalStorage::open(&path).unwrap();
        store.set("settings", "{\"pageSize\":50}").unwrap();
        store.set("flag", "1").unwrap();

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get("settings"), Some("{\"pageSize\":50}"));
        assert_eq!(reopened.get("flag"), Some("1"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_remove_key() {
        let dir = temp_dir("remove");
        let path = dir.join("storage.json");

        let mut store = LocalStorage::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.remove("a").unwrap();
        assert_eq!(LocalStorage::open(&path).unwrap().get("a"), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = temp_dir("corrupt");
        let path = dir.join("storage.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = LocalStorage::open(&path).unwrap();
        assert_eq!(store.get("settings"), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_string_values_dropped() {
        let dir = temp_dir("nonstring");
        let path = dir.join("storage.json");
        std::fs::write(&path, r#"{"keep": "yes", "drop": 5}"#).unwrap();

        let store = LocalStorage::open(&path).unwrap();
        assert_eq!(store.get("keep"), Some("yes"));
        assert_eq!(store.get("drop"), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = temp_dir("atomic");
        let path = dir.join("storage.json");
        atomic_write(&path, b"{}").unwrap();
        atomic_write(&path, b"{\"a\":\"b\"}").unwrap();

        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("storage.json")]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_in_memory_does_not_touch_disk() {
        let mut store = LocalStorage::in_memory();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k"), Some("v"));
        assert!(store.path().is_none());
    }
}
