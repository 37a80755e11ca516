// Named derived views over the task list

use crate::task::Task;
use eyre::eyre;
use std::str::FromStr;

/// Which slice of the task list to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    All,
    #[default]
    Active,
    Pending,   // not completed, not deleted
    Completed, // completed, not deleted
    Deleted,   // soft-deleted
}

impl View {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            View::All => true,
            View::Active => !task.soft_delete,
            View::Pending => !task.completed && !task.soft_delete,
            View::Completed => task.completed && !task.soft_delete,
            View::Deleted => task.soft_delete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            View::All => "all",
            View::Active => "active",
            View::Pending => "pending",
            View::Completed => "completed",
            View::Deleted => "deleted",
        }
    }
}

impl FromStr for View {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(View::All),
            "active" => Ok(View::Active),
            "pending" => Ok(View::Pending),
            "completed" | "done" => Ok(View::Completed),
            "deleted" | "trash" => Ok(View::Deleted),
            other => Err(eyre!("Unknown view: {}", other)),
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
