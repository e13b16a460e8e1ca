use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Corrupt(msg) => write!(f, "persisted state corrupt: {msg}"),
            PersistenceError::Io(msg) => write!(f, "persisted state error: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Durable key-value storage for filters that opt into surviving sessions.
pub trait KeyValueStore: Send {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError>;
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: BTreeMap<String, serde_json::Value>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Single-file JSON store; the whole map is rewritten on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, serde_json::Value>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PersistenceError::Corrupt(format!("{path:?}: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(PersistenceError::Io(format!("read {path:?}: {e}"))),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        std::fs::write(&self.path, payload)
            .map_err(|e| PersistenceError::Io(format!("write {:?}: {e}", self.path)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.clone());
        self.flush()
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryKeyValueStore, JsonFileStore, KeyValueStore, PersistenceError};
    use serde_json::json;

    #[test]
    fn in_memory_round_trip() {
        let mut kv = InMemoryKeyValueStore::new();
        kv.save("year", &json!(2020)).unwrap();
        assert_eq!(kv.load("year").unwrap(), Some(json!(2020)));
        assert!(kv.remove("year").unwrap());
        assert_eq!(kv.load("year").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut kv = JsonFileStore::open(&path).unwrap();
        kv.save("county", &json!(["06075"])).unwrap();
        drop(kv);

        let kv = JsonFileStore::open(&path).unwrap();
        assert_eq!(kv.load("county").unwrap(), Some(json!(["06075"])));
    }

    #[test]
    fn file_store_reports_corrupt_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_)));
    }
}
