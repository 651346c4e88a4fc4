//! Task CRUD, subtree and archive operations.

use super::{Database, from_ms};
use crate::error::TaskError;
use crate::types::{NewTask, Task, TaskFilter, TaskPatch, TaskSort};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::collections::HashSet;

/// Columns selected for every task read. The parent title is joined in.
const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.completed, t.archived,
        t.archived_at, t.created_at, t.parent_task, p.title AS parent_title
     FROM tasks t LEFT JOIN tasks p ON p.id = t.parent_task";

fn order_clause(sort: TaskSort) -> &'static str {
    match sort {
        TaskSort::CreatedDesc => "t.created_at DESC, t.rowid DESC",
        TaskSort::ArchivedDesc => "t.archived_at DESC, t.created_at DESC, t.rowid DESC",
    }
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let archived_at: Option<i64> = row.get("archived_at")?;
    let created_at: i64 = row.get("created_at")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed: row.get("completed")?,
        archived: row.get("archived")?,
        archived_at: archived_at.map(from_ms),
        created_at: from_ms(created_at),
        parent_task: row.get("parent_task")?,
        parent_title: row.get("parent_title")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let sql = format!("{TASK_SELECT} WHERE t.id = ?1");
    let task = conn
        .query_row(&sql, params![task_id], parse_task_row)
        .optional()?;
    Ok(task)
}

/// Parent link of a single task. `None` when the task does not exist.
fn parent_of_internal(conn: &Connection, task_id: &str) -> Result<Option<Option<String>>> {
    let parent = conn
        .query_row(
            "SELECT parent_task FROM tasks WHERE id = ?1",
            params![task_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(parent)
}

/// Ancestor ids of `task_id`, nearest first. Stops early if the stored links
/// loop back on themselves.
fn ancestor_chain_internal(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut chain = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(task_id.to_string());

    let mut current = parent_of_internal(conn, task_id)?.flatten();
    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            tracing::warn!(task_id = %task_id, looped_at = %id, "Parent chain contains a cycle");
            break;
        }
        current = parent_of_internal(conn, &id)?.flatten();
        chain.push(id);
    }

    Ok(chain)
}

/// The task must exist and must not be archived.
fn require_active_internal(conn: &Connection, task_id: &str) -> Result<Task> {
    match get_task_internal(conn, task_id)? {
        None => Err(TaskError::TaskNotFound(task_id.to_string()).into()),
        Some(task) if task.archived => Err(TaskError::TaskArchived(task_id.to_string()).into()),
        Some(task) => Ok(task),
    }
}

/// A prospective parent must exist and must not be archived.
fn require_live_parent_internal(conn: &Connection, parent_id: &str) -> Result<()> {
    match get_task_internal(conn, parent_id)? {
        None => Err(TaskError::ParentNotFound(parent_id.to_string()).into()),
        Some(parent) if parent.archived => {
            Err(TaskError::ParentArchived(parent_id.to_string()).into())
        }
        Some(_) => Ok(()),
    }
}

fn apply_patch_internal(
    conn: &Connection,
    task_id: &str,
    patch: &TaskPatch,
) -> Result<Option<Task>> {
    if patch.is_empty() {
        return get_task_internal(conn, task_id);
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref title) = patch.title {
        sets.push("title = ?");
        params_vec.push(Box::new(title.clone()));
    }
    if let Some(ref description) = patch.description {
        sets.push("description = ?");
        params_vec.push(Box::new(description.clone()));
    }
    if let Some(completed) = patch.completed {
        sets.push("completed = ?");
        params_vec.push(Box::new(completed));
    }
    if let Some(ref parent) = patch.parent_task {
        sets.push("parent_task = ?");
        params_vec.push(Box::new(parent.clone()));
    }

    let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
    params_vec.push(Box::new(task_id.to_string()));
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

    let changed = conn.execute(&sql, params_refs.as_slice())?;
    if changed == 0 {
        return Ok(None);
    }

    get_task_internal(conn, task_id)
}

/// Build the WHERE clause and bound parameters for a filter.
fn filter_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(archived) = filter.archived {
        clauses.push("t.archived = ?");
        params_vec.push(Box::new(archived));
    }

    match &filter.parent_task {
        Some(Some(parent)) => {
            clauses.push("t.parent_task = ?");
            params_vec.push(Box::new(parent.clone()));
        }
        Some(None) => clauses.push("t.parent_task IS NULL"),
        None => {}
    }

    if clauses.is_empty() {
        (String::new(), params_vec)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params_vec)
    }
}

impl Database {
    /// Insert a new task and return the stored record.
    ///
    /// A parent, if given, must exist and be active; the check and the insert
    /// happen under the same lock, so a concurrent sweep cannot archive the
    /// parent in between.
    pub fn insert_task(&self, new_task: &NewTask) -> Result<Task> {
        self.with_conn(|conn| {
            if let Some(ref parent_id) = new_task.parent_task {
                require_live_parent_internal(conn, parent_id)?;
            }

            conn.execute(
                "INSERT INTO tasks (id, title, description, completed, archived, created_at, parent_task)
                 VALUES (?1, ?2, ?3, 0, 0, ?4, ?5)",
                params![
                    &new_task.id,
                    &new_task.title,
                    &new_task.description,
                    new_task.created_at.timestamp_millis(),
                    &new_task.parent_task,
                ],
            )?;

            get_task_internal(conn, &new_task.id)?
                .ok_or_else(|| anyhow!("Task {} vanished after insert", new_task.id))
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Find tasks matching a filter.
    ///
    /// Returns one page of records plus the total number of matches.
    /// `limit = None` returns everything after `skip`.
    pub fn find_tasks(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        skip: u64,
        limit: Option<u32>,
    ) -> Result<(Vec<Task>, u64)> {
        let (where_clause, mut params_vec) = filter_clause(filter);

        self.with_conn(|conn| {
            let count_sql = format!("SELECT COUNT(*) FROM tasks t{where_clause}");
            let count_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
            let total: i64 = conn.query_row(&count_sql, count_refs.as_slice(), |row| row.get(0))?;

            let mut sql = format!("{TASK_SELECT}{where_clause} ORDER BY {}", order_clause(sort));
            let skip = i64::try_from(skip)?;
            match limit {
                Some(l) => {
                    sql.push_str(" LIMIT ? OFFSET ?");
                    params_vec.push(Box::new(i64::from(l)));
                    params_vec.push(Box::new(skip));
                }
                None if skip > 0 => {
                    sql.push_str(" LIMIT -1 OFFSET ?");
                    params_vec.push(Box::new(skip));
                }
                None => {}
            }

            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok((tasks, u64::try_from(total)?))
        })
    }

    /// Apply a partial update. Returns `None` if the task does not exist.
    ///
    /// No business rules are checked here; callers validate first.
    pub fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        self.with_conn(|conn| apply_patch_internal(conn, task_id, patch))
    }

    /// Apply a partial update to an active task.
    ///
    /// Fails with `TaskNotFound` or `TaskArchived`. The archived check and the
    /// write share one lock, so a sweep cannot slip in between.
    pub fn update_active_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task> {
        self.with_conn(|conn| {
            require_active_internal(conn, task_id)?;
            apply_patch_internal(conn, task_id, patch)?
                .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()).into())
        })
    }

    /// Re-parent an active task, refusing moves that would create a cycle.
    ///
    /// Checks run in order: task exists and is active, new parent exists and
    /// is active, new parent is neither the task nor below it. All checks and
    /// the write happen under one lock, so two opposing moves cannot both
    /// pass the cycle check.
    pub fn move_task_checked(&self, task_id: &str, new_parent: Option<&str>) -> Result<Task> {
        self.with_conn(|conn| {
            require_active_internal(conn, task_id)?;

            if let Some(parent_id) = new_parent {
                require_live_parent_internal(conn, parent_id)?;
                if parent_id == task_id
                    || ancestor_chain_internal(conn, parent_id)?
                        .iter()
                        .any(|id| id == task_id)
                {
                    return Err(TaskError::CircularReference {
                        task: task_id.to_string(),
                        parent: parent_id.to_string(),
                    }
                    .into());
                }
            }

            let patch = TaskPatch {
                parent_task: Some(new_parent.map(str::to_string)),
                ..TaskPatch::default()
            };
            apply_patch_internal(conn, task_id, &patch)?
                .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()).into())
        })
    }

    /// Delete a task and every descendant in one transaction.
    ///
    /// Returns the number of removed records; 0 means the task did not exist.
    pub fn delete_task_cascade(&self, task_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // UNION (not UNION ALL) so corrupt cyclic links still terminate
            let removed = tx.execute(
                "WITH RECURSIVE subtree(id) AS (
                    SELECT id FROM tasks WHERE id = ?1
                    UNION
                    SELECT t.id FROM tasks t
                    INNER JOIN subtree s ON t.parent_task = s.id
                )
                DELETE FROM tasks WHERE id IN (SELECT id FROM subtree)",
                params![task_id],
            )?;

            tx.commit()?;
            Ok(removed)
        })
    }

    /// Archive every completed, not yet archived task in a single statement.
    ///
    /// Returns the number of tasks archived.
    pub fn archive_completed(&self, archived_at: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let archived = conn.execute(
                "UPDATE tasks SET archived = 1, archived_at = ?1
                 WHERE completed = 1 AND archived = 0",
                params![archived_at.timestamp_millis()],
            )?;
            Ok(archived)
        })
    }

    /// Total number of stored tasks.
    pub fn count_tasks(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            Ok(u64::try_from(count)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now;
    use uuid::Uuid;

    fn insert(db: &Database, title: &str, parent: Option<&str>) -> Task {
        db.insert_task(&NewTask {
            id: Uuid::now_v7().to_string(),
            title: title.to_string(),
            description: String::new(),
            parent_task: parent.map(str::to_string),
            created_at: now(),
        })
        .unwrap()
    }

    #[test]
    fn insert_resolves_parent_title() {
        let db = Database::open_in_memory().unwrap();
        let parent = insert(&db, "Buy milk", None);
        let child = insert(&db, "2% milk", Some(&parent.id));

        assert_eq!(child.parent_task.as_deref(), Some(parent.id.as_str()));
        assert_eq!(child.parent_title.as_deref(), Some("Buy milk"));
        assert!(parent.parent_title.is_none());
    }

    #[test]
    fn insert_rejects_unknown_parent() {
        let db = Database::open_in_memory().unwrap();
        let result = db.insert_task(&NewTask {
            id: Uuid::now_v7().to_string(),
            title: "Orphan".into(),
            description: String::new(),
            parent_task: Some("missing".into()),
            created_at: now(),
        });
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::ParentNotFound(_))
        ));
        assert_eq!(db.count_tasks().unwrap(), 0);
    }

    #[test]
    fn ancestor_chain_lists_nearest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = insert(&db, "Root", None);
        let b = insert(&db, "Middle", Some(&a.id));
        let c = insert(&db, "Leaf", Some(&b.id));

        let chain = |id: &str| db.with_conn(|conn| ancestor_chain_internal(conn, id)).unwrap();
        assert_eq!(chain(&c.id), vec![b.id.clone(), a.id.clone()]);
        assert!(chain(&a.id).is_empty());
        assert!(chain("missing").is_empty());
    }

    #[test]
    fn filter_clause_matches_top_level() {
        let (sql, params) = filter_clause(&TaskFilter::archived(false).with_parent(None));
        assert_eq!(sql, " WHERE t.archived = ? AND t.parent_task IS NULL");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn empty_patch_returns_current_record() {
        let db = Database::open_in_memory().unwrap();
        let task = insert(&db, "Unchanged", None);
        let same = db.update_task(&task.id, &TaskPatch::default()).unwrap();
        assert_eq!(same, Some(task));
        assert!(db.update_task("missing", &TaskPatch::default()).unwrap().is_none());
    }
}
