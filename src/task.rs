// task.rs

use crate::error::{DashError, Result};
use crate::id::next_id;
#[cfg(test)]
use crate::storage::load_value;
use crate::storage::{Entries, Key, Storage, push_entry};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A todo record. Records written before soft delete existed have no
/// `deletedAt`, and the oldest ones no `completedAt` or `active`; all of
/// those decode as absent/false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
}

impl Task {
    pub fn new(id: String, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
            completed_at: None,
            deleted_at: None,
            active: false,
        }
    }
}

#[cfg(test)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Active,
    Completed,
    Deleted,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HistoryFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl HistoryFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Completed => task.completed,
            HistoryFilter::Incomplete => !task.completed,
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            HistoryFilter::All => HistoryFilter::Completed,
            HistoryFilter::Completed => HistoryFilter::Incomplete,
            HistoryFilter::Incomplete => HistoryFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HistoryFilter::All => "All",
            HistoryFilter::Completed => "Completed",
            HistoryFilter::Incomplete => "Incomplete",
        }
    }
}

/// Deleted tasks sharing one calendar date of deletion.
#[derive(Debug, PartialEq, Eq)]
pub struct HistoryGroup<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<&'a Task>,
}

/// Owns the todo and deleted collections. The in-memory copy is authoritative
/// for the session: every mutation writes both affected collections whole and
/// only updates memory once the write succeeded. Nothing is merged with writes
/// made by other sessions; the last full write wins.
pub struct TaskManager<S> {
    store: S,
    todo: Vec<Task>,
    deleted: Vec<Task>,
}

impl<S: Storage> TaskManager<S> {
    pub fn new(store: S, todo: Vec<Task>, deleted: Vec<Task>) -> Self {
        Self { store, todo, deleted }
    }

    #[cfg(test)]
    #[tracing::instrument(skip(store))]
    pub fn load(store: S) -> Result<Self> {
        let todo: Vec<Task> = load_value(&store, Key::Todolist)?.unwrap_or_default();
        let deleted: Vec<Task> = load_value(&store, Key::DeletedTasks)?.unwrap_or_default();
        debug!(todo = todo.len(), deleted = deleted.len(), "loaded tasks");
        Ok(Self::new(store, todo, deleted))
    }

    pub fn todo(&self) -> &[Task] {
        &self.todo
    }

    pub fn deleted(&self) -> &[Task] {
        &self.deleted
    }

    #[cfg(test)]
    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        if let Some(task) = self.todo.iter().find(|t| t.id == id) {
            Some(if task.completed {
                TaskState::Completed
            } else {
                TaskState::Active
            })
        } else if self.deleted.iter().any(|t| t.id == id) {
            Some(TaskState::Deleted)
        } else {
            None
        }
    }

    pub fn add(&mut self, text: &str) -> Result<&Task> {
        self.add_at(text, Utc::now())
    }

    #[tracing::instrument(skip(self, text))]
    pub fn add_at(&mut self, text: &str, now: DateTime<Utc>) -> Result<&Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DashError::validation("Please enter a task"));
        }
        let id = next_id(
            now,
            self.todo.iter().chain(self.deleted.iter()).map(|t| t.id.as_str()),
        );
        info!(%id, "adding task");

        let mut todo = self.todo.clone();
        todo.push(Task::new(id, text.to_string(), now));
        self.commit(Some(todo), None)?;
        Ok(&self.todo[self.todo.len() - 1])
    }

    pub fn toggle_complete(&mut self, id: &str) -> Result<bool> {
        self.toggle_complete_at(id, Utc::now())
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_complete_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(idx) = self.todo.iter().position(|t| t.id == id) else {
            return Ok(false);
        };
        let mut todo = self.todo.clone();
        let task = &mut todo[idx];
        task.completed = !task.completed;
        task.completed_at = task.completed.then_some(now);
        debug!(completed = task.completed, "toggled task");
        self.commit(Some(todo), None)?;
        Ok(true)
    }

    /// Marks one task as the selected one and clears the flag everywhere else.
    #[tracing::instrument(skip(self))]
    pub fn set_active(&mut self, id: &str) -> Result<bool> {
        if !self.todo.iter().any(|t| t.id == id) {
            return Ok(false);
        }
        let todo = self
            .todo
            .iter()
            .map(|t| Task {
                active: t.id == id,
                ..t.clone()
            })
            .collect();
        self.commit(Some(todo), None)?;
        Ok(true)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        self.delete_at(id, Utc::now())
    }

    /// Moves a task to the deleted collection. Both collections go out in one write.
    #[tracing::instrument(skip(self))]
    pub fn delete_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(idx) = self.todo.iter().position(|t| t.id == id) else {
            debug!("task not in todo list");
            return Ok(false);
        };
        let mut todo = self.todo.clone();
        let mut task = todo.remove(idx);
        task.deleted_at = Some(now);
        let mut deleted = self.deleted.clone();
        deleted.push(task);
        info!("moving task to history");
        self.commit(Some(todo), Some(deleted))?;
        Ok(true)
    }

    /// Moves a task back from the deleted collection, keeping its completion state.
    #[tracing::instrument(skip(self))]
    pub fn restore(&mut self, id: &str) -> Result<bool> {
        let Some(idx) = self.deleted.iter().position(|t| t.id == id) else {
            debug!("task not in history");
            return Ok(false);
        };
        let mut deleted = self.deleted.clone();
        let mut task = deleted.remove(idx);
        task.deleted_at = None;
        let mut todo = self.todo.clone();
        todo.push(task);
        info!("restoring task");
        self.commit(Some(todo), Some(deleted))?;
        Ok(true)
    }

    /// Permanently drops one task from the deleted collection.
    #[tracing::instrument(skip(self))]
    pub fn purge(&mut self, id: &str) -> Result<bool> {
        if !self.deleted.iter().any(|t| t.id == id) {
            return Ok(false);
        }
        let deleted = self.deleted.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(None, Some(deleted))?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_history(&mut self) -> Result<usize> {
        let count = self.deleted.len();
        if count > 0 {
            self.commit(None, Some(Vec::new()))?;
        }
        info!(count, "cleared history");
        Ok(count)
    }

    /// Display order: open tasks oldest first, then completed tasks newest first.
    /// Equal timestamps keep their stored order.
    pub fn sorted(&self) -> Vec<&Task> {
        let mut open: Vec<&Task> = self.todo.iter().filter(|t| !t.completed).collect();
        let mut done: Vec<&Task> = self.todo.iter().filter(|t| t.completed).collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        done.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        open.extend(done);
        open
    }

    pub fn history_local(&self, filter: HistoryFilter) -> Vec<HistoryGroup<'_>> {
        self.history(filter, &Local)
    }

    /// Deleted tasks passing `filter`, grouped by the date of deletion in `tz`,
    /// newest date first. A record without `deletedAt` is filed under its creation date.
    pub fn history<Tz: TimeZone>(&self, filter: HistoryFilter, tz: &Tz) -> Vec<HistoryGroup<'_>> {
        let mut groups: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
        for task in self.deleted.iter().filter(|t| filter.matches(t)) {
            let stamp = task.deleted_at.unwrap_or(task.created_at);
            groups
                .entry(stamp.with_timezone(tz).date_naive())
                .or_default()
                .push(task);
        }
        groups
            .into_iter()
            .rev()
            .map(|(date, tasks)| HistoryGroup { date, tasks })
            .collect()
    }

    fn commit(&mut self, todo: Option<Vec<Task>>, deleted: Option<Vec<Task>>) -> Result<()> {
        let mut entries = Entries::new();
        if let Some(todo) = &todo {
            push_entry(&mut entries, Key::Todolist, todo)?;
        }
        if let Some(deleted) = &deleted {
            push_entry(&mut entries, Key::DeletedTasks, deleted)?;
        }
        self.store.set(entries)?;
        if let Some(todo) = todo {
            self.todo = todo;
        }
        if let Some(deleted) = deleted {
            self.deleted = deleted;
        }
        Ok(())
    }
}
