use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::session::SessionStore;
use crate::stats::{TaskStats, compute_stats};
use crate::storage::{self, StorageError};
use crate::task::{Task, TaskDraft, TaskPatch};

/// Owns the in-memory task collection for one session and persists it
/// through the codec after every mutation. Persistence failures degrade
/// to memory-only operation; the collection here stays authoritative.
#[derive(Debug)]
pub struct Tracker<S: SessionStore> {
    store: S,
    tasks: Vec<Task>,
}

impl<S: SessionStore> Tracker<S> {
    /// Loads the saved collection, seeding demo tasks when storage has
    /// nothing.
    #[tracing::instrument(skip(store, now))]
    pub fn open(store: S, now: DateTime<Utc>) -> Self {
        let loaded = storage::load_tasks(&store);
        let tasks = if loaded.is_empty() {
            info!("no saved tasks; seeding demo collection");
            crate::seed::demo_tasks(now)
        } else {
            info!(count = loaded.len(), "loaded saved tasks");
            loaded
        };

        let mut tracker = Self { store, tasks };
        tracker.persist(now);
        tracker
    }

    /// Opens without the demo-data fallback; an empty store stays empty.
    pub fn open_empty(store: S) -> Self {
        let tasks = storage::load_tasks(&store);
        Self { store, tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        compute_stats(&self.tasks, now)
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Creates a task from the draft and prepends it, newest first.
    #[tracing::instrument(skip(self, draft, now))]
    pub fn add(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Task {
        let task = Task::new(draft, now);
        debug!(id = %task.id, title = %task.title, "adding task");
        self.tasks.insert(0, task.clone());
        self.persist(now);
        task
    }

    /// Merge-patches the task with the given id. Returns false when no
    /// task matches.
    #[tracing::instrument(skip(self, patch, now), fields(id = id))]
    pub fn update(&mut self, id: &str, patch: TaskPatch, now: DateTime<Utc>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        task.apply(patch, now);
        self.persist(now);
        true
    }

    #[tracing::instrument(skip(self, now), fields(id = id))]
    pub fn delete(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.persist(now);
        true
    }

    /// Drops every task and the stored envelope.
    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) {
        self.tasks.clear();
        if let Err(err) = self.store.remove(storage::TASKS_KEY) {
            warn!(error = %err, "failed clearing stored tasks");
        }
    }

    pub fn export(&self) -> Result<String, StorageError> {
        storage::export_tasks(&self.tasks)
    }

    /// Replaces the whole collection with the parsed payload and
    /// persists immediately. On any parse or shape error the current
    /// collection is left untouched.
    #[tracing::instrument(skip(self, payload, now))]
    pub fn import(&mut self, payload: &str, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let imported = storage::import_tasks(payload)?;
        let count = imported.len();
        self.tasks = imported;
        self.persist(now);
        info!(count, "imported task collection");
        Ok(count)
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self, now: DateTime<Utc>) {
        if let Err(err) = storage::save_tasks(&mut self.store, &self.tasks, now) {
            warn!(error = %err, "persist failed; continuing in memory only");
        }
    }
}
