//! Reconstruction of the nested task hierarchy from flat records.

use crate::db::Database;
use crate::types::{Task, TaskFilter, TaskSort, TaskTree};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// Build the forest of tasks whose `archived` flag equals `archived`.
///
/// Roots are top-level tasks. A child only appears under its parent when it
/// shares the same flag, so an active child of an archived parent shows up
/// in neither view. Sibling groups are ordered newest first.
pub fn build_tree(db: &Database, archived: bool) -> Result<Vec<TaskTree>> {
    let (tasks, _) = db.find_tasks(
        &TaskFilter::archived(archived),
        TaskSort::CreatedDesc,
        0,
        None,
    )?;
    Ok(assemble(tasks))
}

/// Assemble already-sorted flat records into a forest.
///
/// Records whose parent is not in `tasks` are dropped along with their
/// subtrees, which is what hides mixed-flag children.
pub fn assemble(tasks: Vec<Task>) -> Vec<TaskTree> {
    let mut roots: Vec<Task> = Vec::new();
    let mut children: HashMap<String, Vec<Task>> = HashMap::new();

    for task in tasks {
        match task.parent_task.clone() {
            None => roots.push(task),
            Some(parent) => children.entry(parent).or_default().push(task),
        }
    }

    let mut visited: HashSet<String> = HashSet::new();
    roots
        .into_iter()
        .map(|root| attach(root, &mut children, &mut visited))
        .collect()
}

fn attach(
    task: Task,
    children: &mut HashMap<String, Vec<Task>>,
    visited: &mut HashSet<String>,
) -> TaskTree {
    visited.insert(task.id.clone());
    let mut subtasks = Vec::new();
    for child in children.remove(&task.id).unwrap_or_default() {
        if visited.contains(&child.id) {
            continue;
        }
        subtasks.push(attach(child, children, visited));
    }
    TaskTree { task, subtasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::from_ms;

    fn task(id: &str, parent: Option<&str>, created_ms: i64) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {id}"),
            description: String::new(),
            completed: false,
            archived: false,
            archived_at: None,
            created_at: from_ms(created_ms),
            parent_task: parent.map(str::to_string),
            parent_title: None,
        }
    }

    #[test]
    fn nests_children_under_parents() {
        let forest = assemble(vec![
            task("b", None, 3),
            task("a2", Some("a"), 2),
            task("a1", Some("a"), 1),
            task("a", None, 0),
            task("a1x", Some("a1"), 4),
        ]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].task.id, "b");
        assert_eq!(forest[1].task.id, "a");
        let kids: Vec<&str> = forest[1].subtasks.iter().map(|t| t.task.id.as_str()).collect();
        assert_eq!(kids, vec!["a2", "a1"]);
        assert_eq!(forest[1].subtasks[1].subtasks[0].task.id, "a1x");
        assert_eq!(forest[1].node_count(), 4);
    }

    #[test]
    fn drops_records_whose_parent_is_absent() {
        let forest = assemble(vec![task("root", None, 0), task("stray", Some("gone"), 1)]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].subtasks.is_empty());
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(assemble(Vec::new()).is_empty());
    }
}
