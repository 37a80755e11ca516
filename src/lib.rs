// TodoStore - Persisted to-do list store with soft delete and expiring snapshots

pub mod config;
pub mod snapshot;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use snapshot::StoreSnapshot;
pub use sqlite::SqliteStorage;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{StoreOptions, StoreStats, TaskStore, now_ms};
pub use task::{Task, TaskDraft, TaskPatch};
pub use view::View;
