use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use timetable::store::{TaskStore, TimetableStore};
use timetable::{Task, TaskStatus, Timetable};

#[derive(Default)]
pub struct InMemoryFleetStore {
    pub tasks: Arc<Mutex<HashMap<String, Task>>>,
    pub timetables: Arc<Mutex<HashMap<String, Timetable>>>,
    pub archived: Arc<Mutex<HashMap<String, Timetable>>>,
}

#[async_trait]
impl TaskStore for InMemoryFleetStore {
    async fn get_task(&self, task_id: &str) -> anyhow::Result<Option<Task>> {
        Ok(self.tasks.lock().await.get(task_id).cloned())
    }

    async fn save_task(&self, task: &Task) -> anyhow::Result<()> {
        self.tasks
            .lock()
            .await
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> anyhow::Result<()> {
        if let Some(task) = self.tasks.lock().await.get_mut(task_id) {
            task.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl TimetableStore for InMemoryFleetStore {
    async fn get_timetable(&self, robot_id: &str) -> anyhow::Result<Option<Timetable>> {
        Ok(self.timetables.lock().await.get(robot_id).cloned())
    }

    async fn save_timetable(&self, timetable: &Timetable) -> anyhow::Result<()> {
        self.timetables
            .lock()
            .await
            .insert(timetable.robot_id.clone(), timetable.clone());
        Ok(())
    }

    async fn archive_timetable(&self, robot_id: &str) -> anyhow::Result<()> {
        if let Some(timetable) = self.timetables.lock().await.remove(robot_id) {
            self.archived
                .lock()
                .await
                .insert(robot_id.to_string(), timetable);
        }
        Ok(())
    }
}
