use chrono::{TimeZone, Utc};

use timetable::store::sqlite_store::SqliteFleetStore;
use timetable::store::{TaskStore, TimetableStore};
use timetable::{InterTimepointConstraint, Task, TaskStatus, Timetable, TransportationRequest};

mod mock_store;
use mock_store::InMemoryFleetStore;

fn sample_task(id: &str) -> Task {
    let request = TransportationRequest {
        pickup_location: "dock_a".into(),
        delivery_location: "ward_3".into(),
        earliest_pickup_time: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single().unwrap(),
        latest_pickup_time: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).single().unwrap(),
        hard_constraints: true,
    };
    Task::from_request(
        id,
        request,
        InterTimepointConstraint::new("travel_time", 600.0, 100.0),
        InterTimepointConstraint::new("work_time", 300.0, 25.0),
    )
}

fn sample_timetable(robot_id: &str) -> Timetable {
    let ztp = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap();
    let mut timetable = Timetable::new(robot_id, ztp);
    timetable.add_task(&sample_task("t1"), 1).unwrap();
    timetable.solve_stp().unwrap();
    timetable
}

#[tokio::test]
async fn sqlite_task_round_trip() -> anyhow::Result<()> {
    let store = SqliteFleetStore::new("sqlite::memory:").await?;

    let task = sample_task("t1");
    store.save_task(&task).await?;

    let loaded = store.get_task("t1").await?.unwrap();
    assert_eq!(loaded, task);

    assert!(store.get_task("missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn sqlite_save_task_upserts() -> anyhow::Result<()> {
    let store = SqliteFleetStore::new("sqlite::memory:").await?;

    let mut task = sample_task("t1");
    store.save_task(&task).await?;

    task.freeze();
    task.assign_robot("robot_001");
    store.save_task(&task).await?;

    let loaded = store.get_task("t1").await?.unwrap();
    assert!(loaded.frozen);
    assert_eq!(loaded.assigned_robots, vec!["robot_001"]);
    Ok(())
}

#[tokio::test]
async fn sqlite_update_task_status() -> anyhow::Result<()> {
    let store = SqliteFleetStore::new("sqlite::memory:").await?;

    store.save_task(&sample_task("t1")).await?;
    store.update_task_status("t1", TaskStatus::Allocated).await?;

    let loaded = store.get_task("t1").await?.unwrap();
    assert_eq!(loaded.status, TaskStatus::Allocated);
    Ok(())
}

#[tokio::test]
async fn sqlite_timetable_round_trip_preserves_solved_graph() -> anyhow::Result<()> {
    let store = SqliteFleetStore::new("sqlite::memory:").await?;

    let timetable = sample_timetable("robot_001");
    store.save_timetable(&timetable).await?;

    let loaded = store.get_timetable("robot_001").await?.unwrap();
    assert_eq!(loaded, timetable);
    assert!(loaded.dispatchable_graph.is_some());
    Ok(())
}

#[tokio::test]
async fn sqlite_archive_is_idempotent() -> anyhow::Result<()> {
    let store = SqliteFleetStore::new("sqlite::memory:").await?;

    store.save_timetable(&sample_timetable("robot_001")).await?;

    store.archive_timetable("robot_001").await?;
    assert!(store.get_timetable("robot_001").await?.is_none());

    // Archiving again (or archiving an unknown robot) must not fail.
    store.archive_timetable("robot_001").await?;
    store.archive_timetable("robot_404").await?;
    Ok(())
}

#[tokio::test]
async fn mock_store_matches_contract() -> anyhow::Result<()> {
    let store = InMemoryFleetStore::default();

    store.save_task(&sample_task("t1")).await?;
    store.update_task_status("t1", TaskStatus::Allocated).await?;
    assert_eq!(
        store.get_task("t1").await?.unwrap().status,
        TaskStatus::Allocated
    );

    store.save_timetable(&sample_timetable("robot_001")).await?;
    store.archive_timetable("robot_001").await?;
    store.archive_timetable("robot_001").await?;
    assert!(store.get_timetable("robot_001").await?.is_none());
    assert!(store.archived.lock().await.contains_key("robot_001"));
    Ok(())
}
