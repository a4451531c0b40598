pub mod sqlite_store;

use crate::task::{Task, TaskStatus};
use crate::timetable::Timetable;

#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, task_id: &str) -> anyhow::Result<Option<Task>>;
    async fn save_task(&self, task: &Task) -> anyhow::Result<()>;
    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait TimetableStore: Send + Sync {
    async fn get_timetable(&self, robot_id: &str) -> anyhow::Result<Option<Timetable>>;
    async fn save_timetable(&self, timetable: &Timetable) -> anyhow::Result<()>;
    /// Move the robot's row to the archive. Idempotent: archiving an
    /// absent timetable is a no-op.
    async fn archive_timetable(&self, robot_id: &str) -> anyhow::Result<()>;
}
