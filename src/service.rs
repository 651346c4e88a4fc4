//! Task service: validation and tree-consistency rules on top of the store.
//!
//! Every rule is checked before the first write, so a rejected request leaves
//! the store untouched. Rules that depend on stored state (parent liveness,
//! archived flags, ancestry) are checked by the store under the same lock as
//! the write they guard.

use crate::config::PaginationConfig;
use crate::db::{Database, now};
use crate::error::{TaskError, TaskResult};
use crate::tree::build_tree;
use crate::types::{
    DESCRIPTION_MAX_CHARS, NewTask, Pagination, TITLE_MAX_CHARS, TITLE_MIN_CHARS, Task,
    TaskFilter, TaskPage, TaskPatch, TaskSort, TaskTree,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Fields accepted by `update`. Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Trim and length-check a title.
pub fn validate_title(raw: &str) -> TaskResult<String> {
    let title = raw.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        return Err(TaskError::validation(
            "title",
            format!("Title must be at least {TITLE_MIN_CHARS} characters"),
        ));
    }
    if len > TITLE_MAX_CHARS {
        return Err(TaskError::validation(
            "title",
            format!("Title must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(title.to_string())
}

/// Trim and length-check a description.
pub fn validate_description(raw: &str) -> TaskResult<String> {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(TaskError::validation(
            "description",
            format!("Description must be at most {DESCRIPTION_MAX_CHARS} characters"),
        ));
    }
    Ok(description.to_string())
}

/// Treat an empty parent id the same as no parent.
fn normalize_parent(parent: Option<String>) -> Option<String> {
    parent.filter(|p| !p.trim().is_empty())
}

#[derive(Clone)]
pub struct TaskService {
    db: Arc<Database>,
    pagination: PaginationConfig,
}

impl TaskService {
    pub fn new(db: Arc<Database>, pagination: PaginationConfig) -> Self {
        Self { db, pagination }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Look up a task or fail with `TaskNotFound`.
    pub fn get(&self, task_id: &str) -> TaskResult<Task> {
        self.db
            .get_task(task_id)?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }

    /// Create a task, optionally under an active parent.
    pub fn create(
        &self,
        title: &str,
        description: Option<&str>,
        parent_task: Option<String>,
    ) -> TaskResult<Task> {
        let title = validate_title(title)?;
        let description = validate_description(description.unwrap_or_default())?;

        // Parent existence and liveness are checked by the store under the
        // same lock as the insert.
        let task = self.db.insert_task(&NewTask {
            id: Uuid::now_v7().to_string(),
            title,
            description,
            parent_task: normalize_parent(parent_task),
            created_at: now(),
        })?;

        info!(task_id = %task.id, parent = ?task.parent_task, "Task created");
        Ok(task)
    }

    pub fn update(&self, task_id: &str, update: TaskUpdate) -> TaskResult<Task> {
        // Report a missing or archived task ahead of field errors; the store
        // checks both again while it holds the write lock.
        if self.get(task_id)?.archived {
            return Err(TaskError::TaskArchived(task_id.to_string()));
        }

        let patch = TaskPatch {
            // An empty title means "unchanged", as the web client sends it
            title: update
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(validate_title)
                .transpose()?,
            description: update
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?,
            completed: update.completed,
            parent_task: None,
        };

        let updated = self.db.update_active_task(task_id, &patch)?;

        debug!(task_id = %task_id, completed = updated.completed, "Task updated");
        Ok(updated)
    }

    /// Re-parent a task. `None` moves it to the top level.
    pub fn move_task(&self, task_id: &str, new_parent: Option<String>) -> TaskResult<Task> {
        let new_parent = normalize_parent(new_parent);
        let moved = self.db.move_task_checked(task_id, new_parent.as_deref())?;

        info!(task_id = %task_id, parent = ?moved.parent_task, "Task moved");
        Ok(moved)
    }

    /// Delete a task together with its whole subtree.
    ///
    /// Returns the number of removed tasks.
    pub fn delete(&self, task_id: &str) -> TaskResult<usize> {
        self.get(task_id)?;

        let removed = self.db.delete_task_cascade(task_id)?;
        if removed == 0 {
            // Deleted concurrently between the lookup and the cascade
            return Err(TaskError::TaskNotFound(task_id.to_string()));
        }

        info!(task_id = %task_id, removed, "Task and subtasks deleted");
        Ok(removed)
    }

    /// Active tasks, newest first.
    pub fn list_active(&self, page: Option<u32>, limit: Option<u32>) -> TaskResult<TaskPage> {
        self.list_page(false, page, limit)
    }

    /// Archived tasks, most recently archived first.
    pub fn list_archived(&self, page: Option<u32>, limit: Option<u32>) -> TaskResult<TaskPage> {
        self.list_page(true, page, limit)
    }

    fn list_page(
        &self,
        archived: bool,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> TaskResult<TaskPage> {
        let (page, limit) = self.resolve_page(page, limit);
        let sort = if archived {
            TaskSort::ArchivedDesc
        } else {
            TaskSort::CreatedDesc
        };
        let skip = u64::from(page - 1) * u64::from(limit);

        let (tasks, total) =
            self.db
                .find_tasks(&TaskFilter::archived(archived), sort, skip, Some(limit))?;

        Ok(TaskPage {
            tasks,
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// Apply defaults and bounds: zero or missing values fall back to the
    /// defaults and the limit is capped at the configured maximum.
    pub fn resolve_page(&self, page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let max = self.pagination.max_limit.max(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.pagination.default_limit)
            .clamp(1, max);
        (page, limit)
    }

    /// Nested view of all tasks sharing the given archived flag.
    pub fn tree(&self, archived: bool) -> TaskResult<Vec<TaskTree>> {
        Ok(build_tree(&self.db, archived)?)
    }
}
