//! Tests for the background archive loop.

use std::sync::Arc;
use std::time::Duration;
use task_tree::archiver::Archiver;
use task_tree::config::PaginationConfig;
use task_tree::db::Database;
use task_tree::service::{TaskService, TaskUpdate};

fn setup() -> (Arc<Database>, TaskService) {
    let db = Arc::new(Database::open_in_memory().expect("Failed to create in-memory database"));
    let service = TaskService::new(Arc::clone(&db), PaginationConfig::default());
    (db, service)
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn periodic_sweep_archives_completed_tasks() {
    let (db, service) = setup();
    let done = service.create("Ship release", None, None).unwrap();
    let open = service.create("Plan next release", None, None).unwrap();
    service
        .update(
            &done.id,
            TaskUpdate {
                completed: Some(true),
                ..TaskUpdate::default()
            },
        )
        .unwrap();

    let handle = Arc::new(Archiver::new(db)).spawn(Duration::from_millis(20));

    let archived = wait_until(|| service.get(&done.id).unwrap().archived).await;
    handle.shutdown().await;

    assert!(archived, "completed task was never archived");
    assert!(!service.get(&open.id).unwrap().archived);
    assert_eq!(service.list_archived(None, None).unwrap().pagination.total, 1);
}

#[tokio::test]
async fn tasks_completed_later_are_picked_up() {
    let (db, service) = setup();
    let handle = Arc::new(Archiver::new(db)).spawn(Duration::from_millis(20));

    let task = service.create("Late finisher", None, None).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!service.get(&task.id).unwrap().archived);

    service
        .update(
            &task.id,
            TaskUpdate {
                completed: Some(true),
                ..TaskUpdate::default()
            },
        )
        .unwrap();

    let archived = wait_until(|| service.get(&task.id).unwrap().archived).await;
    handle.shutdown().await;
    assert!(archived);
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let (db, _) = setup();
    let handle = Arc::new(Archiver::new(db)).spawn(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(35)).await;
    assert!(!handle.is_finished());

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("archiver did not stop");
}
