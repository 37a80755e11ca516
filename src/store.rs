// Task list store with write-through snapshot persistence

use crate::config::{Config, DEFAULT_MODE, DEFAULT_STORAGE_KEY};
use crate::snapshot::{DEFAULT_EXPIRATION_MS, StoreSnapshot};
use crate::storage::Storage;
use crate::task::{DEFAULT_PRIORITY, Task, TaskDraft, TaskPatch};
use crate::view::View;
use chrono::Utc;
use eyre::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

/// Id of the example task seeded into an empty store
const EXAMPLE_TASK_ID: i64 = 1;

/// Knobs for a store instance
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub storage_key: String,
    pub default_mode: String,
    pub expiration_ms: i64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_mode: DEFAULT_MODE.to_string(),
            expiration_ms: DEFAULT_EXPIRATION_MS,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            default_mode: config.default_mode.clone(),
            expiration_ms: config.expiration_ms(),
        }
    }
}

/// Counts for each derived view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub completed: usize,
    pub deleted: usize,
    pub completion_rate: u32,
}

/// Ordered task list plus the current mode, mirrored into one storage slot
///
/// Every mutation rewrites the whole snapshot. Operations addressed by id
/// return `Ok(false)` when the id is unknown and leave everything untouched.
pub struct TaskStore<S: Storage = Box<dyn Storage>> {
    tasks: Vec<Task>,
    current_mode: String,
    is_loading: bool,
    storage: S,
    options: StoreOptions,
}

impl<S: Storage> TaskStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_options(storage, StoreOptions::default())
    }

    pub fn with_options(storage: S, options: StoreOptions) -> Self {
        Self {
            tasks: Vec::new(),
            current_mode: options.default_mode.clone(),
            is_loading: false,
            storage,
            options,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn current_mode(&self) -> &str {
        &self.current_mode
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.options.storage_key
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load persisted state, falling back to a single example task.
    ///
    /// Never fails: unreadable or stale snapshots count as absent. The example
    /// is only seeded into an empty list, so calling this again without a
    /// stored snapshot keeps the tasks already in memory.
    pub fn initialize(&mut self) {
        let mut guard = LoadingGuard::begin(self);
        if !guard.load_from_storage() && guard.tasks.is_empty() {
            guard.seed_example();
        }
    }

    /// Replace tasks and mode from a fresh snapshot.
    ///
    /// Returns true only when a snapshot was applied. A stale snapshot is
    /// removed from storage; read or parse failures are logged and ignored.
    pub fn load_from_storage(&mut self) -> bool {
        let key = self.options.storage_key.as_str();

        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No persisted snapshot");
                return false;
            }
            Err(e) => {
                warn!(key, error = ?e, "Failed to read snapshot, treating as absent");
                return false;
            }
        };

        let snapshot = match StoreSnapshot::from_json(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(key, error = ?e, "Failed to parse snapshot, treating as absent");
                return false;
            }
        };

        if !snapshot.is_fresh(now_ms(), self.options.expiration_ms) {
            info!(key, timestamp = snapshot.timestamp, "Snapshot expired, discarding");
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, error = ?e, "Failed to remove expired snapshot");
            }
            return false;
        }

        info!(key, count = snapshot.tasks.len(), mode = %snapshot.current_mode, "Loaded snapshot");
        self.tasks = snapshot.tasks;
        self.current_mode = snapshot.current_mode;
        true
    }

    /// Overwrite the storage slot with the current state
    pub fn save_to_storage(&mut self) -> Result<()> {
        let snapshot = StoreSnapshot {
            tasks: self.tasks.clone(),
            current_mode: self.current_mode.clone(),
            timestamp: now_ms(),
        };
        let json = snapshot.to_json().context("Failed to serialize snapshot")?;

        self.storage
            .set_item(&self.options.storage_key, &json)
            .context("Failed to write snapshot")?;

        debug!(key = %self.options.storage_key, count = self.tasks.len(), "Saved snapshot");
        Ok(())
    }

    fn seed_example(&mut self) {
        debug!("Seeding example task");
        let draft = TaskDraft::new("Example task")
            .priority(DEFAULT_PRIORITY)
            .tags(["example"]);
        self.tasks = vec![Task::from_draft(EXAMPLE_TASK_ID, draft, Utc::now())];
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new task built from `draft` and return a copy of it
    pub fn add_todo(&mut self, draft: TaskDraft) -> Result<Task> {
        let task = Task::from_draft(self.next_id(), draft, Utc::now());
        debug!(id = task.id, "add_todo");

        self.tasks.push(task.clone());
        self.save_to_storage()?;
        Ok(task)
    }

    pub fn update_todo(&mut self, patch: TaskPatch) -> Result<bool> {
        let Some(task) = self.find_mut(patch.id) else {
            return Ok(false);
        };
        debug!(id = patch.id, "update_todo");

        patch.apply_to(task);
        task.updated_at = Some(Utc::now());
        self.save_to_storage()?;
        Ok(true)
    }

    /// Flip `completed`, stamping or clearing `completed_at`
    pub fn complete_todo(&mut self, id: i64) -> Result<bool> {
        let Some(task) = self.find_mut(id) else {
            return Ok(false);
        };

        task.completed = !task.completed;
        task.completed_at = task.completed.then(Utc::now);
        debug!(id, completed = task.completed, "complete_todo");

        self.save_to_storage()?;
        Ok(true)
    }

    /// Soft delete: the task stays in the list, flagged
    pub fn delete_todo(&mut self, id: i64) -> Result<bool> {
        let Some(task) = self.find_mut(id) else {
            return Ok(false);
        };
        debug!(id, "delete_todo");

        task.soft_delete = true;
        task.deleted_at = Some(Utc::now());
        self.save_to_storage()?;
        Ok(true)
    }

    /// Remove the task for good. Persists even on a miss.
    pub fn permanently_delete_todo(&mut self, id: i64) -> Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        debug!(id, removed, "permanently_delete_todo");

        self.save_to_storage()?;
        Ok(removed)
    }

    pub fn restore_todo(&mut self, id: i64) -> Result<bool> {
        let Some(task) = self.find_mut(id) else {
            return Ok(false);
        };
        debug!(id, "restore_todo");

        task.soft_delete = false;
        task.deleted_at = None;
        self.save_to_storage()?;
        Ok(true)
    }

    /// Replace the list with `new_order`. The caller supplies a permutation;
    /// nothing checks that it is one.
    pub fn reorder_todos(&mut self, new_order: Vec<Task>) -> Result<()> {
        debug!(count = new_order.len(), "reorder_todos");
        self.tasks = new_order;
        self.save_to_storage()
    }

    /// Move one task to `position` (clamped to the end of the list) and
    /// persist the new order through `reorder_todos`
    pub fn move_todo(&mut self, id: i64, position: usize) -> Result<bool> {
        let Some(from) = self.tasks.iter().position(|t| t.id == id) else {
            return Ok(false);
        };

        let mut order = self.tasks.clone();
        let task = order.remove(from);
        order.insert(position.min(order.len()), task);
        self.reorder_todos(order)?;
        Ok(true)
    }

    pub fn clear_all_todos(&mut self) -> Result<()> {
        debug!(count = self.tasks.len(), "clear_all_todos");
        self.tasks.clear();
        self.save_to_storage()
    }

    pub fn set_current_mode(&mut self, mode: impl Into<String>) -> Result<()> {
        self.current_mode = mode.into();
        debug!(mode = %self.current_mode, "set_current_mode");
        self.save_to_storage()
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn view(&self, view: View) -> Vec<&Task> {
        self.tasks.iter().filter(|t| view.matches(t)).collect()
    }

    pub fn completed_todos(&self) -> Vec<&Task> {
        self.view(View::Completed)
    }

    pub fn pending_todos(&self) -> Vec<&Task> {
        self.view(View::Pending)
    }

    pub fn deleted_todos(&self) -> Vec<&Task> {
        self.view(View::Deleted)
    }

    pub fn active_todos(&self) -> Vec<&Task> {
        self.view(View::Active)
    }

    /// Rounded percentage of active tasks that are completed; 0 with none active
    pub fn completion_rate(&self) -> u32 {
        let active = self.tasks.iter().filter(|t| t.is_active()).count();
        if active == 0 {
            return 0;
        }
        let completed = self.tasks.iter().filter(|t| t.is_active() && t.completed).count();
        (completed as f64 * 100.0 / active as f64).round() as u32
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total: self.tasks.len(),
            active: self.active_todos().len(),
            pending: self.pending_todos().len(),
            completed: self.completed_todos().len(),
            deleted: self.deleted_todos().len(),
            completion_rate: self.completion_rate(),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn find_mut(&mut self, id: i64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Time-derived, but always past every id already in the list.
    /// Once `i64::MAX` is taken, the lowest unused positive id is handed out.
    fn next_id(&self) -> i64 {
        let max = self.tasks.iter().map(|t| t.id).max().unwrap_or(0);
        match max.checked_add(1) {
            Some(next) => now_ms().max(next),
            None => {
                let taken: HashSet<i64> = self.tasks.iter().map(|t| t.id).collect();
                warn!("Task ids exhausted at i64::MAX, reusing lowest free id");
                (1..).find(|id| !taken.contains(id)).unwrap_or(1)
            }
        }
    }
}

impl TaskStore {
    /// Open the configured backend and build a store over it
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = config.open_storage()?;
        Ok(Self::with_options(storage, StoreOptions::from(config)))
    }
}

/// Holds `is_loading` up for as long as it lives
struct LoadingGuard<'a, S: Storage> {
    store: &'a mut TaskStore<S>,
}

impl<'a, S: Storage> LoadingGuard<'a, S> {
    fn begin(store: &'a mut TaskStore<S>) -> Self {
        store.is_loading = true;
        Self { store }
    }
}

impl<S: Storage> Deref for LoadingGuard<'_, S> {
    type Target = TaskStore<S>;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

impl<S: Storage> DerefMut for LoadingGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.store
    }
}

impl<S: Storage> Drop for LoadingGuard<'_, S> {
    fn drop(&mut self) {
        self.store.is_loading = false;
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
