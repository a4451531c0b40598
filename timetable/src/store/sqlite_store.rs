//! SQLite-backed implementation of the fleet persistence interface.
//!
//! Durable storage for tasks and per-robot timetables so that:
//!
//!  - allocations survive restarts
//!  - completed robots' timetables can be archived for later inspection
//!  - the auctioneer and bidders operate purely in-memory otherwise
//!
//! Persistence failures are surfaced to callers as errors; the auction
//! layer treats them as warnings, never as fatal (in-memory state stays
//! authoritative during a session).

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use super::{TaskStore, TimetableStore};
use crate::task::{Task, TaskStatus, TemporalConstraints, TransportationRequest};
use crate::timetable::Timetable;

/// SQLite persistence for tasks and timetables.
///
/// Creates its schema on startup; `save_*` uses upsert semantics.
pub struct SqliteFleetStore {
    pool: SqlitePool,
}

impl SqliteFleetStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and ensure the schema
    /// exists.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                delayed INTEGER NOT NULL,
                frozen INTEGER NOT NULL,
                assigned_robots_json TEXT NOT NULL,
                request_json TEXT NOT NULL,
                constraints_json TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timetables (
                robot_id TEXT PRIMARY KEY,
                zero_timepoint TEXT NOT NULL,
                stn_json TEXT NOT NULL,
                dispatchable_graph_json TEXT,
                schedule TEXT
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timetable_archive (
                robot_id TEXT PRIMARY KEY,
                zero_timepoint TEXT NOT NULL,
                stn_json TEXT NOT NULL,
                dispatchable_graph_json TEXT,
                schedule TEXT
            );
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn decode_timetable(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Timetable> {
        let robot_id: String = row.get("robot_id");
        let ztp_str: String = row.get("zero_timepoint");
        let zero_timepoint = DateTime::parse_from_rfc3339(&ztp_str)
            .map_err(|e| anyhow::anyhow!("Invalid zero timepoint '{}': {}", ztp_str, e))?
            .to_utc();

        let stn_json: String = row.get("stn_json");
        let stn = serde_json::from_str(&stn_json)
            .map_err(|e| anyhow::anyhow!("Invalid STN for robot {}: {}", robot_id, e))?;

        let graph_json: Option<String> = row.get("dispatchable_graph_json");
        let dispatchable_graph = match graph_json {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                anyhow::anyhow!("Invalid dispatchable graph for robot {}: {}", robot_id, e)
            })?),
            None => None,
        };

        Ok(Timetable {
            robot_id,
            zero_timepoint,
            stn,
            dispatchable_graph,
            schedule: row.get("schedule"),
        })
    }
}

#[async_trait]
impl TaskStore for SqliteFleetStore {
    async fn get_task(&self, task_id: &str) -> anyhow::Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };

        let status_str: String = row.get("status");
        let status = TaskStatus::from_str(&status_str)?;

        let request_json: String = row.get("request_json");
        let request: TransportationRequest = serde_json::from_str(&request_json)?;

        let constraints_json: String = row.get("constraints_json");
        let constraints: TemporalConstraints = serde_json::from_str(&constraints_json)?;

        let assigned_json: String = row.get("assigned_robots_json");
        let assigned_robots: Vec<String> = serde_json::from_str(&assigned_json)?;

        Ok(Some(Task {
            task_id: row.get("task_id"),
            request,
            constraints,
            status,
            delayed: row.get::<i64, _>("delayed") != 0,
            frozen: row.get::<i64, _>("frozen") != 0,
            assigned_robots,
        }))
    }

    async fn save_task(&self, task: &Task) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                task_id, status, delayed, frozen,
                assigned_robots_json, request_json, constraints_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                status = excluded.status,
                delayed = excluded.delayed,
                frozen = excluded.frozen,
                assigned_robots_json = excluded.assigned_robots_json,
                request_json = excluded.request_json,
                constraints_json = excluded.constraints_json;
        "#,
        )
        .bind(&task.task_id)
        .bind(task.status.to_string())
        .bind(task.delayed as i64)
        .bind(task.frozen as i64)
        .bind(serde_json::to_string(&task.assigned_robots)?)
        .bind(serde_json::to_string(&task.request)?)
        .bind(serde_json::to_string(&task.constraints)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> anyhow::Result<()> {
        sqlx::query("UPDATE tasks SET status = ? WHERE task_id = ?")
            .bind(status.to_string())
            .bind(task_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TimetableStore for SqliteFleetStore {
    async fn get_timetable(&self, robot_id: &str) -> anyhow::Result<Option<Timetable>> {
        let row = sqlx::query("SELECT * FROM timetables WHERE robot_id = ?")
            .bind(robot_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::decode_timetable(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_timetable(&self, timetable: &Timetable) -> anyhow::Result<()> {
        let graph_json = match &timetable.dispatchable_graph {
            Some(graph) => Some(serde_json::to_string(graph)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO timetables (
                robot_id, zero_timepoint, stn_json,
                dispatchable_graph_json, schedule
            )
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(robot_id) DO UPDATE SET
                zero_timepoint = excluded.zero_timepoint,
                stn_json = excluded.stn_json,
                dispatchable_graph_json = excluded.dispatchable_graph_json,
                schedule = excluded.schedule;
        "#,
        )
        .bind(&timetable.robot_id)
        .bind(timetable.zero_timepoint.to_rfc3339())
        .bind(serde_json::to_string(&timetable.stn)?)
        .bind(graph_json)
        .bind(&timetable.schedule)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn archive_timetable(&self, robot_id: &str) -> anyhow::Result<()> {
        // Copy-then-delete; both statements are no-ops when the row is
        // already gone, which keeps the operation idempotent.
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO timetable_archive
            SELECT * FROM timetables WHERE robot_id = ?;
        "#,
        )
        .bind(robot_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM timetables WHERE robot_id = ?")
            .bind(robot_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
