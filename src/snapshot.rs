// Persisted unit of store state

use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Default lifetime of a persisted snapshot (24 hours, in milliseconds)
pub const DEFAULT_EXPIRATION_MS: i64 = 24 * 60 * 60 * 1000;

/// Full store state as written to the storage slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(alias = "todos")]
    pub tasks: Vec<Task>,
    pub current_mode: String,
    /// Milliseconds since epoch at write time
    #[serde(default)]
    pub timestamp: i64,
}

impl StoreSnapshot {
    /// A snapshot is fresh while `0 <= now - timestamp <= expiration_ms`.
    /// Non-positive timestamps and timestamps from the future are stale.
    pub fn is_fresh(&self, now_ms: i64, expiration_ms: i64) -> bool {
        if self.timestamp <= 0 {
            return false;
        }
        now_ms
            .checked_sub(self.timestamp)
            .is_some_and(|age| (0..=expiration_ms).contains(&age))
    }

    pub fn to_json(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
