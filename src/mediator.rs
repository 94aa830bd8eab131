// mediator.rs
//
// Long-lived thread that owns the store. Views talk to it only through
// request/reply channels, so they never hold the store themselves.

use crate::error::{DashError, Result};
use crate::link::Link;
use crate::storage::{Entries, Key, Storage, push_entry};
use crate::task::Task;
use crate::theme::Theme;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Everything a view needs at mount time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardData {
    pub hotlinks: Vec<Link>,
    pub todolist: Vec<Task>,
    pub deleted_tasks: Vec<Task>,
    pub theme: Theme,
}

enum Request {
    Get {
        keys: Vec<Key>,
        reply: Sender<Result<Entries>>,
    },
    GetData {
        reply: Sender<Result<DashboardData>>,
    },
    SaveData {
        data_type: String,
        data: Value,
        reply: Sender<Result<()>>,
    },
    SaveMany {
        entries: Entries,
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

/// Writes the default value for every key that is absent. Returns the keys it filled.
#[tracing::instrument(skip(store))]
pub fn initialize_defaults<S: Storage + ?Sized>(store: &S) -> Result<Vec<Key>> {
    let present = store.get(&Key::ALL)?;
    let mut defaults = Entries::new();
    let mut filled = Vec::new();
    for key in Key::ALL {
        if present.get(key.as_str()).is_some_and(|v| !v.is_null()) {
            continue;
        }
        match key {
            Key::Theme => push_entry(&mut defaults, key, &Theme::default())?,
            _ => push_entry(&mut defaults, key, &Vec::<Value>::new())?,
        }
        filled.push(key);
    }
    if !filled.is_empty() {
        store.set(defaults)?;
        info!(?filled, "initialized default values");
    }
    Ok(filled)
}

/// Rejects names outside the key space and values that do not decode as the key's records.
pub fn check_entry(name: &str, value: &Value) -> Result<Key> {
    let key = Key::parse(name)?;
    let shape = match key {
        Key::Hotlinks => Vec::<Link>::deserialize(value).map(drop),
        Key::Todolist | Key::DeletedTasks => Vec::<Task>::deserialize(value).map(drop),
        Key::Theme => Theme::deserialize(value).map(drop),
    };
    shape.map_err(|source| DashError::Shape {
        key: key.as_str(),
        source,
    })?;
    Ok(key)
}

fn decode<T: DeserializeOwned + Default>(found: &mut Entries, key: Key) -> Result<T> {
    match found.remove(key.as_str()) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|source| DashError::Shape {
            key: key.as_str(),
            source,
        }),
    }
}

fn read_data<S: Storage>(store: &S) -> Result<DashboardData> {
    let mut found = store.get(&Key::ALL)?;
    Ok(DashboardData {
        hotlinks: decode(&mut found, Key::Hotlinks)?,
        todolist: decode(&mut found, Key::Todolist)?,
        deleted_tasks: decode(&mut found, Key::DeletedTasks)?,
        theme: decode(&mut found, Key::Theme).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable theme, using default");
            Theme::default()
        }),
    })
}

fn save_checked<S: Storage>(store: &S, entries: Entries) -> Result<()> {
    for (name, value) in &entries {
        check_entry(name, value)?;
    }
    store.set(entries)
}

fn serve<S: Storage>(store: S, requests: Receiver<Request>) {
    info!("mediator running");
    // Ends on Shutdown or once every handle is dropped.
    while let Ok(request) = requests.recv() {
        match request {
            Request::Get { keys, reply } => {
                let _ = reply.send(store.get(&keys));
            }
            Request::GetData { reply } => {
                let data = read_data(&store);
                if let Err(e) = &data {
                    error!(error = %e, "getData failed");
                }
                let _ = reply.send(data);
            }
            Request::SaveData {
                data_type,
                data,
                reply,
            } => {
                let mut entries = Entries::new();
                entries.insert(data_type.clone(), data);
                let result = save_checked(&store, entries);
                match &result {
                    Ok(()) => debug!(%data_type, "saveData ok"),
                    Err(e) => warn!(%data_type, error = %e, "saveData rejected"),
                }
                let _ = reply.send(result);
            }
            Request::SaveMany { entries, reply } => {
                let keys = entries.len();
                let result = save_checked(&store, entries);
                if let Err(e) = &result {
                    warn!(keys, error = %e, "batched save rejected");
                }
                let _ = reply.send(result);
            }
            Request::Shutdown => break,
        }
    }
    info!("mediator stopped");
}

/// The running mediator. Stop it with [`Mediator::shutdown`].
pub struct Mediator {
    handle: MediatorHandle,
    thread: Option<JoinHandle<()>>,
}

impl Mediator {
    /// Fills in defaults, then hands the store to a background thread.
    #[tracing::instrument(skip(store))]
    pub fn spawn<S: Storage + Send + 'static>(store: S) -> Result<Self> {
        initialize_defaults(&store)?;
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("mediator".to_string())
            .spawn(move || serve(store, rx))
            .map_err(DashError::Spawn)?;
        Ok(Self {
            handle: MediatorHandle { requests: tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> MediatorHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.handle.requests.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("mediator thread panicked");
            }
        }
    }
}

impl Drop for Mediator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cheap, cloneable client side of the mediator.
#[derive(Clone)]
pub struct MediatorHandle {
    requests: Sender<Request>,
}

impl MediatorHandle {
    fn round_trip<T>(&self, make: impl FnOnce(Sender<Result<T>>) -> Request) -> Result<T> {
        let (reply, answer) = mpsc::channel();
        self.requests
            .send(make(reply))
            .map_err(|_| DashError::MediatorGone)?;
        answer.recv().map_err(|_| DashError::MediatorGone)?
    }

    pub fn get_data(&self) -> Result<DashboardData> {
        self.round_trip(|reply| Request::GetData { reply })
    }

    /// Writes one key. The value must match the key's record shape.
    pub fn save_data(&self, data_type: &str, data: Value) -> Result<()> {
        self.round_trip(|reply| Request::SaveData {
            data_type: data_type.to_string(),
            data,
            reply,
        })
    }
}

impl Storage for MediatorHandle {
    fn get(&self, keys: &[Key]) -> Result<Entries> {
        self.round_trip(|reply| Request::Get {
            keys: keys.to_vec(),
            reply,
        })
    }

    /// Single-key writes go out as `saveData`, larger ones as one batch.
    fn set(&self, entries: Entries) -> Result<()> {
        if entries.len() != 1 {
            return self.round_trip(|reply| Request::SaveMany { entries, reply });
        }
        match entries.into_iter().next() {
            Some((data_type, data)) => self.save_data(&data_type, data),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{LinkManager, NewLink};
    use crate::storage::{MemoryStore, entry};
    use crate::task::TaskManager;
    use crate::theme::ThemePreference;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn defaults_fill_only_missing_keys() {
        let store = MemoryStore::new();
        store.set(entry(Key::Theme, &Theme::GoldenPurple).unwrap()).unwrap();

        let filled = initialize_defaults(&store).unwrap();
        assert_eq!(filled, [Key::Hotlinks, Key::Todolist, Key::DeletedTasks]);
        let doc = store.snapshot();
        assert_eq!(doc.get("hotlinks"), Some(&json!([])));
        assert_eq!(doc.get("theme"), Some(&json!("goldenPurple")));

        let writes = store.writes();
        assert!(initialize_defaults(&store).unwrap().is_empty());
        assert_eq!(store.writes(), writes);
    }

    #[test]
    fn get_data_after_first_start() {
        let mediator = Mediator::spawn(MemoryStore::new()).unwrap();
        let data = mediator.handle().get_data().unwrap();
        assert_eq!(data, DashboardData::default());
        assert_eq!(data.theme, Theme::DaybreakBlue);
        mediator.shutdown();
    }

    #[test]
    fn save_data_validates_key_and_shape() {
        let store = Arc::new(MemoryStore::new());
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();
        let handle = mediator.handle();

        handle.save_data("theme", json!("goldenPurple")).unwrap();
        assert_eq!(handle.get_data().unwrap().theme, Theme::GoldenPurple);

        assert!(matches!(
            handle.save_data("bookmarks", json!([])),
            Err(DashError::UnknownKey(_))
        ));
        assert!(matches!(
            handle.save_data("todolist", json!([{"text": "no id"}])),
            Err(DashError::Shape { key: "todolist", .. })
        ));
        assert!(matches!(
            handle.save_data("theme", json!("neon")),
            Err(DashError::Shape { key: "theme", .. })
        ));
        assert_eq!(store.snapshot().get("todolist"), Some(&json!([])));
    }

    #[test]
    fn managers_run_over_the_handle() {
        let store = Arc::new(MemoryStore::new());
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();

        let mut links = LinkManager::load(mediator.handle()).unwrap();
        links.add(NewLink::new("example.com").name("Example")).unwrap();

        let mut tasks = TaskManager::load(mediator.handle()).unwrap();
        let id = tasks.add("ship it").unwrap().id.clone();
        tasks.delete(&id).unwrap();

        let mut theme = ThemePreference::load(mediator.handle()).unwrap();
        theme.toggle().unwrap();

        let data = mediator.handle().get_data().unwrap();
        assert_eq!(data.hotlinks, links.links());
        assert!(data.todolist.is_empty());
        assert_eq!(data.deleted_tasks, tasks.deleted());
        assert_eq!(data.theme, Theme::GoldenPurple);
    }

    #[test]
    fn storage_failure_reaches_the_manager() {
        let store = Arc::new(MemoryStore::new());
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();
        let mut tasks = TaskManager::load(mediator.handle()).unwrap();

        store.fail_writes(true);
        assert!(matches!(tasks.add("x"), Err(DashError::WriteRejected(_))));
        assert!(tasks.todo().is_empty());
    }

    #[test]
    fn batch_with_one_bad_entry_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();
        let before = store.snapshot();

        let mut batch = Entries::new();
        batch.insert("todolist".into(), json!([{"id": "1", "text": "kept?", "createdAt": "2024-03-01T09:30:00Z"}]));
        batch.insert("deletedTasks".into(), json!({"not": "a list"}));
        assert!(matches!(
            mediator.handle().set(batch),
            Err(DashError::Shape { key: "deletedTasks", .. })
        ));

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.snapshot().get("todolist"), Some(&json!([])));
    }

    #[test]
    fn single_key_writes_are_validated_too() {
        let store = Arc::new(MemoryStore::new());
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();
        let writes = store.writes();

        let mut bad = Entries::new();
        bad.insert("hotlinks".into(), json!("nope"));
        assert!(matches!(
            mediator.handle().set(bad),
            Err(DashError::Shape { key: "hotlinks", .. })
        ));
        assert_eq!(store.writes(), writes);
    }

    #[test]
    fn unreadable_theme_falls_back_to_default() {
        let mut seeded = Entries::new();
        seeded.insert("theme".into(), json!("neon"));
        let store = Arc::new(MemoryStore::with_entries(seeded));
        let mediator = Mediator::spawn(Arc::clone(&store)).unwrap();

        let data = mediator.handle().get_data().unwrap();
        assert_eq!(data.theme, Theme::DaybreakBlue);
        assert_eq!(store.snapshot().get("theme"), Some(&json!("neon")));
    }

    #[test]
    fn handle_reports_stopped_mediator() {
        let mediator = Mediator::spawn(MemoryStore::new()).unwrap();
        let handle = mediator.handle();
        mediator.shutdown();
        assert!(matches!(handle.get_data(), Err(DashError::MediatorGone)));
        assert!(matches!(
            handle.save_data("theme", json!("goldenPurple")),
            Err(DashError::MediatorGone)
        ));
    }
}
