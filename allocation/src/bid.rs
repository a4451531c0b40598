//! A robot's feasibility and cost report for one (task, position) pair.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stn::TaskId;
use timetable::{RobotId, Timetable};

/// Ordering is lexicographic on `(risk_metric, temporal_metric)`, with
/// `+inf` greater than any finite value. A no-bid carries infinite cost
/// on both metrics and loses against every real bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub robot_id: RobotId,
    pub round_id: Uuid,
    pub task_id: TaskId,
    pub position: usize,
    #[serde(with = "stn::encoding::float")]
    pub risk_metric: f64,
    #[serde(with = "stn::encoding::float")]
    pub temporal_metric: f64,
    /// Earliest feasible start for a soft-constraint bid, outside the
    /// task's original window.
    pub alternative_start_time: Option<DateTime<Utc>>,
    pub hard_constraints: bool,
    /// Candidate timetable the bidder commits verbatim on winning.
    /// Absent on no-bids.
    pub timetable: Option<Timetable>,
}

impl Bid {
    pub fn no_bid(robot_id: &str, round_id: Uuid, task_id: &str) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            round_id,
            task_id: task_id.to_string(),
            position: 0,
            risk_metric: f64::INFINITY,
            temporal_metric: f64::INFINITY,
            alternative_start_time: None,
            hard_constraints: true,
            timetable: None,
        }
    }

    pub fn is_no_bid(&self) -> bool {
        self.risk_metric.is_infinite() && self.temporal_metric.is_infinite()
    }

    /// Lexicographic cost comparison on `(risk_metric, temporal_metric)`.
    pub fn cmp_cost(&self, other: &Bid) -> Ordering {
        self.risk_metric
            .total_cmp(&other.risk_metric)
            .then_with(|| self.temporal_metric.total_cmp(&other.temporal_metric))
    }

    /// Strict preference used when a bidder picks its single best bid:
    /// lower cost wins, equal cost falls back to the lower task id.
    pub fn prefer(&self, other: &Bid) -> bool {
        match self.cmp_cost(other) {
            Ordering::Less => true,
            Ordering::Equal => self.task_id < other.task_id,
            Ordering::Greater => false,
        }
    }
}

/// Integer suffix of a robot id (`robot_001` -> 1), used to break ties
/// between equal bids from different robots. Ids without a numeric
/// suffix sort last.
pub fn robot_index(robot_id: &str) -> u32 {
    robot_id
        .rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(u32::MAX)
}
