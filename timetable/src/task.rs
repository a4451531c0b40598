//! Transportation task model: the request, its temporal constraints and
//! the allocation lifecycle status.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use stn::TaskId;

pub type RobotId = String;

/// Wire encoding of "no upper bound" for absolute datetimes.
pub fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True for any instant in the sentinel year or later.
pub fn is_far_future(t: &DateTime<Utc>) -> bool {
    t.year() >= 9999
}

/// Named absolute window for one task timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimepointConstraint {
    pub name: String,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
}

impl TimepointConstraint {
    /// Window in seconds relative to `ztp`. A far-future bound becomes
    /// `f64::INFINITY`.
    pub fn relative_to_ztp(&self, ztp: DateTime<Utc>) -> (f64, f64) {
        (
            relative_seconds(&self.earliest_time, ztp),
            relative_seconds(&self.latest_time, ztp),
        )
    }

    /// Absolute datetime for an offset in seconds from `ztp`; infinity
    /// maps back to the far-future sentinel.
    pub fn absolute_time(ztp: DateTime<Utc>, relative: f64) -> DateTime<Utc> {
        if relative.is_infinite() {
            far_future()
        } else {
            ztp + Duration::milliseconds((relative * 1_000.0) as i64)
        }
    }
}

impl fmt::Display for TimepointConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}, {}]",
            self.name,
            self.earliest_time.to_rfc3339(),
            self.latest_time.to_rfc3339()
        )
    }
}

fn relative_seconds(t: &DateTime<Utc>, ztp: DateTime<Utc>) -> f64 {
    if is_far_future(t) {
        f64::INFINITY
    } else {
        (*t - ztp).num_milliseconds() as f64 / 1_000.0
    }
}

/// Named duration distribution between two task timepoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterTimepointConstraint {
    pub name: String,
    pub mean: f64,
    pub variance: f64,
}

impl InterTimepointConstraint {
    pub fn new(name: &str, mean: f64, variance: f64) -> Self {
        Self {
            name: name.to_string(),
            mean,
            variance,
        }
    }

    pub fn standard_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

impl fmt::Display for InterTimepointConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: N({}, {})", self.name, self.mean, self.standard_dev())
    }
}

/// The temporal constraint bundle a task is announced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConstraints {
    /// When false, the task may be scheduled outside its original
    /// windows (alternative timeslot, requires operator confirmation).
    pub hard: bool,
    pub timepoint_constraints: Vec<TimepointConstraint>,
    pub inter_timepoint_constraints: Vec<InterTimepointConstraint>,
}

impl TemporalConstraints {
    pub fn get_timepoint_constraint(&self, name: &str) -> Option<&TimepointConstraint> {
        self.timepoint_constraints.iter().find(|c| c.name == name)
    }

    pub fn get_inter_timepoint_constraint(&self, name: &str) -> Option<&InterTimepointConstraint> {
        self.inter_timepoint_constraints
            .iter()
            .find(|c| c.name == name)
    }

    /// Insert or replace the named absolute window.
    pub fn update_timepoint_constraint(
        &mut self,
        name: &str,
        earliest_time: DateTime<Utc>,
        latest_time: DateTime<Utc>,
    ) {
        match self.timepoint_constraints.iter_mut().find(|c| c.name == name) {
            Some(c) => {
                c.earliest_time = earliest_time;
                c.latest_time = latest_time;
            }
            None => self.timepoint_constraints.push(TimepointConstraint {
                name: name.to_string(),
                earliest_time,
                latest_time,
            }),
        }
    }

    /// Insert or replace the named duration distribution.
    pub fn update_inter_timepoint_constraint(&mut self, name: &str, mean: f64, variance: f64) {
        match self
            .inter_timepoint_constraints
            .iter_mut()
            .find(|c| c.name == name)
        {
            Some(c) => {
                c.mean = mean;
                c.variance = variance;
            }
            None => self
                .inter_timepoint_constraints
                .push(InterTimepointConstraint::new(name, mean, variance)),
        }
    }
}

/// Allocation lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Unallocated,
    Allocated,
    Planned,
    Dispatched,
    Completed,
    Canceled,
    Preempted,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Unallocated => "Unallocated",
            TaskStatus::Allocated => "Allocated",
            TaskStatus::Planned => "Planned",
            TaskStatus::Dispatched => "Dispatched",
            TaskStatus::Completed => "Completed",
            TaskStatus::Canceled => "Canceled",
            TaskStatus::Preempted => "Preempted",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unallocated" => Ok(TaskStatus::Unallocated),
            "Allocated" => Ok(TaskStatus::Allocated),
            "Planned" => Ok(TaskStatus::Planned),
            "Dispatched" => Ok(TaskStatus::Dispatched),
            "Completed" => Ok(TaskStatus::Completed),
            "Canceled" => Ok(TaskStatus::Canceled),
            "Preempted" => Ok(TaskStatus::Preempted),
            other => Err(anyhow::anyhow!("Invalid TaskStatus value: {}", other)),
        }
    }
}

/// What the user asked for: move something from A to B within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportationRequest {
    pub pickup_location: String,
    pub delivery_location: String,
    pub earliest_pickup_time: DateTime<Utc>,
    pub latest_pickup_time: DateTime<Utc>,
    pub hard_constraints: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub request: TransportationRequest,
    pub constraints: TemporalConstraints,

    // Lifecycle
    pub status: TaskStatus,
    pub delayed: bool,
    pub frozen: bool,
    pub assigned_robots: Vec<RobotId>,
}

impl Task {
    /// Build a task from a transportation request plus the estimated
    /// travel and work duration distributions. The pickup window of the
    /// request becomes the initial `pickup` timepoint constraint.
    pub fn from_request(
        task_id: &str,
        request: TransportationRequest,
        travel_time: InterTimepointConstraint,
        work_time: InterTimepointConstraint,
    ) -> Self {
        let pickup = TimepointConstraint {
            name: "pickup".to_string(),
            earliest_time: request.earliest_pickup_time,
            latest_time: request.latest_pickup_time,
        };

        let constraints = TemporalConstraints {
            hard: request.hard_constraints,
            timepoint_constraints: vec![pickup],
            inter_timepoint_constraints: vec![travel_time, work_time],
        };

        Self {
            task_id: task_id.to_string(),
            request,
            constraints,
            status: TaskStatus::Unallocated,
            delayed: false,
            frozen: false,
            assigned_robots: Vec::new(),
        }
    }

    pub fn get_timepoint_constraint(&self, name: &str) -> Option<&TimepointConstraint> {
        self.constraints.get_timepoint_constraint(name)
    }

    pub fn get_inter_timepoint_constraint(&self, name: &str) -> Option<&InterTimepointConstraint> {
        self.constraints.get_inter_timepoint_constraint(name)
    }

    /// Downgrade the task to soft constraints: scheduling outside the
    /// original windows becomes admissible.
    pub fn set_soft_constraints(&mut self) {
        self.constraints.hard = false;
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn mark_as_delayed(&mut self) {
        self.delayed = true;
    }

    pub fn assign_robot(&mut self, robot_id: &str) {
        if !self.assigned_robots.iter().any(|r| r == robot_id) {
            self.assigned_robots.push(robot_id.to_string());
        }
    }

    /// The task with the minimum earliest timepoint constraint.
    pub fn earliest_task(tasks: &[Task]) -> Option<&Task> {
        tasks.iter().min_by_key(|task| {
            task.constraints
                .timepoint_constraints
                .iter()
                .map(|c| c.earliest_time)
                .min()
                .unwrap_or_else(far_future)
        })
    }
}
