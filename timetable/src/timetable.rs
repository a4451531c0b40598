//! Per-robot timetable: the robot's STN, the zero timepoint all relative
//! times are measured from, and the latest solved dispatchable graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stn::{Interval, Stn, StnError, TaskId, TaskTimepoints, TimepointKind};

use crate::task::{InterTimepointConstraint, RobotId, Task, TimepointConstraint};

/// Duration edges span `mean - K*sigma .. mean + K*sigma`.
const SIGMA_FACTOR: f64 = 2.0;

/// The STP solver found no consistent schedule for a candidate insertion.
/// The caller is responsible for rolling the insertion back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no STP solution for robot {robot_id}")]
pub struct NoStpSolution {
    pub robot_id: RobotId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub robot_id: RobotId,
    pub zero_timepoint: DateTime<Utc>,
    pub stn: Stn,
    /// Present only after a successful [`Timetable::solve_stp`].
    pub dispatchable_graph: Option<stn::DispatchableGraph>,
    /// The immediate-next task committed for execution, set by the
    /// dispatching layer. The auction only checks its presence.
    pub schedule: Option<TaskId>,
}

impl Timetable {
    pub fn new(robot_id: &str, zero_timepoint: DateTime<Utc>) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            zero_timepoint,
            stn: Stn::new(),
            dispatchable_graph: None,
            schedule: None,
        }
    }

    /// Translate the task's constraints to seconds from the zero
    /// timepoint and splice them into the STN at `position`.
    pub fn add_task(&mut self, task: &Task, position: usize) -> Result<(), StnError> {
        let timepoints = self.task_timepoints(task);
        self.stn.insert(timepoints, position)
    }

    /// Remove the task at `position` from the STN.
    pub fn remove_task(&mut self, position: usize) -> Result<(), StnError> {
        self.stn.remove(position).map(|_| ())
    }

    /// Invoke the solver and store the resulting dispatchable graph.
    pub fn solve_stp(&mut self) -> Result<(), NoStpSolution> {
        match self.stn.solve() {
            Ok(graph) => {
                self.dispatchable_graph = Some(graph);
                Ok(())
            }
            Err(_) => Err(NoStpSolution {
                robot_id: self.robot_id.clone(),
            }),
        }
    }

    /// Task ids in position order.
    pub fn tasks(&self) -> Vec<TaskId> {
        self.stn.get_tasks()
    }

    /// True once the first task has been committed for execution; the
    /// auction must not displace it.
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Absolute earliest start of a task, read from the solved graph.
    pub fn earliest_start_time(&self, task_id: &str) -> Option<DateTime<Utc>> {
        let graph = self.dispatchable_graph.as_ref()?;
        let relative = graph.get_time(task_id, TimepointKind::Start, true)?;
        Some(TimepointConstraint::absolute_time(
            self.zero_timepoint,
            relative,
        ))
    }

    fn task_timepoints(&self, task: &Task) -> TaskTimepoints {
        let start = match task.get_timepoint_constraint("pickup") {
            Some(constraint) => {
                let (lower, mut upper) = constraint.relative_to_ztp(self.zero_timepoint);
                if !task.constraints.hard {
                    // Soft task: the original window no longer binds
                    // from above, so the solver may shift it later.
                    upper = f64::INFINITY;
                }
                (lower, upper)
            }
            None => (0.0, f64::INFINITY),
        };

        let finish = match task.get_timepoint_constraint("delivery") {
            Some(constraint) => constraint.relative_to_ztp(self.zero_timepoint),
            None => (0.0, f64::INFINITY),
        };

        TaskTimepoints {
            task_id: task.task_id.clone(),
            navigation: (0.0, f64::INFINITY),
            start,
            finish,
            travel_time: duration_bounds(task.get_inter_timepoint_constraint("travel_time")),
            work_time: duration_bounds(task.get_inter_timepoint_constraint("work_time")),
        }
    }
}

fn duration_bounds(constraint: Option<&InterTimepointConstraint>) -> Interval {
    match constraint {
        Some(c) => {
            let sigma = c.standard_dev();
            (
                (c.mean - SIGMA_FACTOR * sigma).max(0.0),
                c.mean + SIGMA_FACTOR * sigma,
            )
        }
        None => (0.0, f64::INFINITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TransportationRequest;
    use chrono::TimeZone;

    fn ztp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap()
    }

    fn sample_task(id: &str, earliest_h: u32, latest_h: u32) -> Task {
        let request = TransportationRequest {
            pickup_location: "dock_a".into(),
            delivery_location: "ward_3".into(),
            earliest_pickup_time: Utc
                .with_ymd_and_hms(2024, 6, 1, earliest_h, 0, 0)
                .single()
                .unwrap(),
            latest_pickup_time: Utc
                .with_ymd_and_hms(2024, 6, 1, latest_h, 0, 0)
                .single()
                .unwrap(),
            hard_constraints: true,
        };
        Task::from_request(
            id,
            request,
            InterTimepointConstraint::new("travel_time", 600.0, 100.0),
            InterTimepointConstraint::new("work_time", 300.0, 25.0),
        )
    }

    #[test]
    fn add_task_translates_pickup_window_to_relative_seconds() {
        let mut timetable = Timetable::new("robot_001", ztp());
        timetable.add_task(&sample_task("t1", 8, 9), 1).unwrap();
        timetable.solve_stp().unwrap();

        let graph = timetable.dispatchable_graph.as_ref().unwrap();
        let start = graph.get_time("t1", TimepointKind::Start, true).unwrap();
        assert!((28_800.0..=32_400.0).contains(&start));
    }

    #[test]
    fn infeasible_insertion_is_rolled_back_by_caller() {
        let mut timetable = Timetable::new("robot_001", ztp());
        timetable.add_task(&sample_task("t1", 8, 9), 1).unwrap();
        timetable.solve_stp().unwrap();

        // A second task that must be done before the first can travel.
        let mut impossible = sample_task("t2", 8, 8);
        impossible.constraints.update_timepoint_constraint(
            "delivery",
            ztp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 1, 0).single().unwrap(),
        );
        timetable.add_task(&impossible, 2).unwrap();

        assert!(timetable.solve_stp().is_err());

        timetable.remove_task(2).unwrap();
        assert!(timetable.solve_stp().is_ok());
        assert_eq!(timetable.tasks(), vec!["t1"]);
    }

    #[test]
    fn soft_task_ignores_upper_pickup_bound() {
        let mut timetable = Timetable::new("robot_001", ztp());

        // Occupy 8:00-9:00 tightly, leaving no room inside t2's window.
        timetable.add_task(&sample_task("t1", 8, 9), 1).unwrap();

        let mut soft = sample_task("t2", 8, 8);
        soft.set_soft_constraints();
        timetable.add_task(&soft, 2).unwrap();

        timetable.solve_stp().unwrap();
        let graph = timetable.dispatchable_graph.as_ref().unwrap();
        let start = graph.get_time("t2", TimepointKind::Start, true).unwrap();
        // Pushed past its original 8:00 deadline, after t1.
        assert!(start > 28_800.0);
    }

    #[test]
    fn earliest_start_time_is_absolute() {
        let mut timetable = Timetable::new("robot_001", ztp());
        timetable.add_task(&sample_task("t1", 8, 9), 1).unwrap();
        timetable.solve_stp().unwrap();

        let start = timetable.earliest_start_time("t1").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single().unwrap());
    }

    #[test]
    fn identical_operations_produce_equal_timetables() {
        let mut a = Timetable::new("robot_001", ztp());
        let mut b = Timetable::new("robot_001", ztp());
        a.add_task(&sample_task("t1", 8, 9), 1).unwrap();
        b.add_task(&sample_task("t1", 8, 9), 1).unwrap();
        a.solve_stp().unwrap();
        b.solve_stp().unwrap();
        assert_eq!(a, b);
    }
}
