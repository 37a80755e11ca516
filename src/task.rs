// Task records and the inputs used to create and edit them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority assigned when a draft leaves it unset
pub const DEFAULT_PRIORITY: u8 = 2;

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A single to-do item as held in memory and in the persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "epoch")]
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub soft_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a fresh task from a draft. Flags start cleared.
    pub fn from_draft(id: i64, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text: draft.text,
            completed: false,
            completed_at: None,
            // a zero priority falls back to the default, like an unset one
            priority: draft.priority.filter(|p| *p != 0).unwrap_or(DEFAULT_PRIORITY),
            datetime: draft.datetime.unwrap_or(now),
            tags: draft.tags.unwrap_or_default(),
            created_at: now,
            updated_at: None,
            soft_delete: false,
            deleted_at: None,
        }
    }

    /// Not soft-deleted
    pub fn is_active(&self) -> bool {
        !self.soft_delete
    }
}

/// Caller-supplied fields for a new task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub text: String,
    pub datetime: Option<DateTime<Utc>>,
    pub priority: Option<u8>,
    pub tags: Option<Vec<String>>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = Some(datetime);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// Partial update addressed by id. Only the fields that are `Some` overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub id: i64,
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<u8>,
    pub datetime: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.datetime.is_none()
            && self.tags.is_none()
    }

    pub(crate) fn apply_to(self, task: &mut Task) {
        if let Some(text) = self.text {
            task.text = text;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(datetime) = self.datetime {
            task.datetime = datetime;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
    }
}
