// storage.rs

use crate::error::{DashError, Result};
use serde::Serialize;
#[cfg(test)]
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub type Entries = Map<String, Value>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Hotlinks,
    Todolist,
    DeletedTasks,
    Theme,
}

impl Key {
    pub const ALL: [Key; 4] = [Key::Hotlinks, Key::Todolist, Key::DeletedTasks, Key::Theme];

    pub fn as_str(self) -> &'static str {
        match self {
            Key::Hotlinks => "hotlinks",
            Key::Todolist => "todolist",
            Key::DeletedTasks => "deletedTasks",
            Key::Theme => "theme",
        }
    }

    pub fn parse(name: &str) -> Result<Key> {
        Key::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| DashError::UnknownKey(name.to_string()))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store holding whole collections under fixed keys.
///
/// `set` with several entries must apply all of them or none.
pub trait Storage {
    fn get(&self, keys: &[Key]) -> Result<Entries>;
    fn set(&self, entries: Entries) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn get(&self, keys: &[Key]) -> Result<Entries> {
        (**self).get(keys)
    }

    fn set(&self, entries: Entries) -> Result<()> {
        (**self).set(entries)
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get(&self, keys: &[Key]) -> Result<Entries> {
        (**self).get(keys)
    }

    fn set(&self, entries: Entries) -> Result<()> {
        (**self).set(entries)
    }
}

#[cfg(test)]
/// Reads one key and decodes it. `Ok(None)` when the key is absent or null.
pub fn load_value<T: DeserializeOwned, S: Storage + ?Sized>(store: &S, key: Key) -> Result<Option<T>> {
    let mut found = store.get(&[key])?;
    match found.remove(key.as_str()) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|source| DashError::Shape { key: key.as_str(), source }),
    }
}

/// Builds a single-key write batch.
pub fn entry<T: Serialize + ?Sized>(key: Key, value: &T) -> Result<Entries> {
    let mut entries = Entries::new();
    push_entry(&mut entries, key, value)?;
    Ok(entries)
}

pub fn push_entry<T: Serialize + ?Sized>(entries: &mut Entries, key: Key, value: &T) -> Result<()> {
    entries.insert(key.as_str().to_string(), serde_json::to_value(value)?);
    Ok(())
}

fn pick(doc: &Entries, keys: &[Key]) -> Entries {
    keys.iter()
        .filter_map(|k| doc.get(k.as_str()).map(|v| (k.as_str().to_string(), v.clone())))
        .collect()
}

/// The whole store as one JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    #[tracing::instrument(skip(path))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| DashError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        info!(file = %path.display(), exists = path.exists(), "opened json store");
        Ok(Self { path, lock: Mutex::new(()) })
    }

    fn read_doc(&self) -> Result<Entries> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => {
                return Err(DashError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_doc(&self, doc: &Entries) -> Result<()> {
        let io_err = |source: std::io::Error| DashError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush().map_err(io_err)?;
        }
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl Storage for JsonFileStore {
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn get(&self, keys: &[Key]) -> Result<Entries> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.read_doc()?;
        Ok(pick(&doc, keys))
    }

    #[tracing::instrument(skip(self, entries), fields(file = %self.path.display(), keys = entries.len()))]
    fn set(&self, entries: Entries) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_doc()?;
        doc.extend(entries);
        self.write_doc(&doc)?;
        debug!("store written");
        Ok(())
    }
}

/// In-process store. Writes can be switched to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Entries>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Entries) -> Self {
        Self {
            doc: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Entries {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
impl Storage for MemoryStore {
    fn get(&self, keys: &[Key]) -> Result<Entries> {
        let doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        Ok(pick(&doc, keys))
    }

    fn set(&self, entries: Entries) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            tracing::warn!(keys = entries.len(), "memory store refusing write");
            return Err(DashError::WriteRejected("memory store is read-only".to_string()));
        }
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.extend(entries);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_names_round_trip() {
        for key in Key::ALL {
            assert_eq!(Key::parse(key.as_str()).unwrap(), key);
        }
        assert!(matches!(Key::parse("bookmarks"), Err(DashError::UnknownKey(_))));
    }

    #[test]
    fn file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested").join("store.json")).unwrap();
        assert!(store.get(&Key::ALL).unwrap().is_empty());
        assert_eq!(load_value::<Vec<String>, _>(&store, Key::Hotlinks).unwrap(), None);
    }

    #[test]
    fn file_store_merges_writes_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(entry(Key::Theme, "goldenPurple").unwrap()).unwrap();
            let mut batch = Entries::new();
            push_entry(&mut batch, Key::Todolist, &json!([{"id": "1"}])).unwrap();
            push_entry(&mut batch, Key::DeletedTasks, &json!([])).unwrap();
            store.set(batch).unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        let all = store.get(&Key::ALL).unwrap();
        assert_eq!(all.get("theme"), Some(&json!("goldenPurple")));
        assert_eq!(all.get("todolist"), Some(&json!([{"id": "1"}])));
        assert_eq!(all.get("deletedTasks"), Some(&json!([])));
        assert!(all.get("hotlinks").is_none());
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(store.get(&[Key::Theme]), Err(DashError::Json(_))));
    }

    #[test]
    fn file_store_failed_batch_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{\"theme\": \"daybreakBlue\",").unwrap();
        let store = JsonFileStore::open(&path).unwrap();

        let mut batch = Entries::new();
        push_entry(&mut batch, Key::Todolist, &json!([])).unwrap();
        push_entry(&mut batch, Key::Theme, "goldenPurple").unwrap();
        assert!(matches!(store.set(batch), Err(DashError::Json(_))));

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"theme\": \"daybreakBlue\",");
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, ["store.json"]);
    }

    #[test]
    fn file_store_pointing_at_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set(entry(Key::Theme, "goldenPurple").unwrap()),
            Err(DashError::Io { .. })
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn load_value_reports_wrong_shape() {
        let store = MemoryStore::new();
        store.set(entry(Key::Todolist, &json!("oops")).unwrap()).unwrap();
        let err = load_value::<Vec<u32>, _>(&store, Key::Todolist).unwrap_err();
        assert!(matches!(err, DashError::Shape { key: "todolist", .. }));
    }

    #[test]
    fn memory_store_rejected_write_leaves_data() {
        let store = MemoryStore::new();
        store.set(entry(Key::Theme, "daybreakBlue").unwrap()).unwrap();
        store.fail_writes(true);
        assert!(store.set(entry(Key::Theme, "goldenPurple").unwrap()).is_err());
        assert_eq!(store.snapshot().get("theme"), Some(&json!("daybreakBlue")));
        assert_eq!(store.writes(), 1);
    }
}
