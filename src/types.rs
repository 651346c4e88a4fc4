//! Core types for the task tree service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum title length, in characters, after trimming.
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum title length, in characters, after trimming.
pub const TITLE_MAX_CHARS: usize = 100;
/// Maximum description length, in characters, after trimming.
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Id of the parent task, `None` for top-level tasks.
    pub parent_task: Option<String>,
    /// Title of the parent task, resolved at read time.
    pub parent_title: Option<String>,
}

impl Task {
    pub fn is_top_level(&self) -> bool {
        self.parent_task.is_none()
    }
}

/// Values for a task about to be inserted. Already validated.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub parent_task: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a task's editable fields.
///
/// `parent_task` uses a double option: `None` leaves the parent alone,
/// `Some(None)` detaches the task to the top level.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub parent_task: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.parent_task.is_none()
    }
}

/// Filter for store queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub archived: Option<bool>,
    /// `Some(None)` matches top-level tasks only.
    pub parent_task: Option<Option<String>>,
}

impl TaskFilter {
    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: Option<&str>) -> Self {
        self.parent_task = Some(parent.map(str::to_string));
        self
    }
}

/// Sort order for store queries. Both orders are descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    CreatedDesc,
    ArchivedDesc,
}

/// A task together with its nested subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<TaskTree>,
}

impl TaskTree {
    /// Number of nodes in this subtree, including the root.
    pub fn node_count(&self) -> usize {
        1 + self.subtasks.iter().map(TaskTree::node_count).sum::<usize>()
    }
}

/// Pagination metadata returned with list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// One page of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}
