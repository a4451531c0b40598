use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use stn::TaskId;
use timetable::RobotId;

/// Round outcomes other than a plain allocation. Everything else the
/// auction can go wrong with is recovered locally and never surfaces.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    /// Election found no finite-cost bid; pending tasks stay queued for
    /// the next round.
    #[error("no allocation in round {round_id}")]
    NoAllocation { round_id: Uuid },

    /// The winning bid lies outside the task's original hard window and
    /// requires operator confirmation before it can be dispatched.
    #[error("alternative timeslot for task {task_id} on robot {robot_id}")]
    AlternativeTimeSlot {
        task_id: TaskId,
        robot_id: RobotId,
        alternative_start_time: Option<DateTime<Utc>>,
    },
}
