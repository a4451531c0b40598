//! The APSP-minimised form of a solved STN.
//!
//! Every entry of the distance matrix is tight, so execution-time bounds
//! are read straight from the first row (latest times) and first column
//! (earliest times). All values are seconds from the zero timepoint.

use serde::{Deserialize, Serialize};

use crate::TaskId;
use crate::graph::{NODES_PER_TASK, TimepointKind};

/// Two timepoints closer together than this are considered rigid.
const SLACK_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchableGraph {
    /// Task ids in position order; node indices are derived from this.
    tasks: Vec<TaskId>,
    /// Minimal distance matrix over `1 + 3 * tasks.len()` nodes.
    #[serde(with = "crate::encoding::matrix")]
    dist: Vec<Vec<f64>>,
}

impl DispatchableGraph {
    pub(crate) fn new(tasks: Vec<TaskId>, dist: Vec<Vec<f64>>) -> Self {
        Self { tasks, dist }
    }

    /// Task ids in position order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn node_index(&self, task_id: &str, timepoint: TimepointKind) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t == task_id)
            .map(|p| 1 + NODES_PER_TASK * p + timepoint.offset())
    }

    /// Seconds from the zero timepoint at which the given timepoint may
    /// execute: the earliest time when `lower`, the latest otherwise
    /// (`f64::INFINITY` when unbounded). `None` for unknown tasks.
    pub fn get_time(&self, task_id: &str, timepoint: TimepointKind, lower: bool) -> Option<f64> {
        let i = self.node_index(task_id, timepoint)?;
        Some(if lower {
            -self.dist[i][0]
        } else {
            self.dist[0][i]
        })
    }

    fn earliest(&self, node: usize) -> f64 {
        -self.dist[node][0]
    }

    fn latest(&self, node: usize) -> f64 {
        self.dist[0][node]
    }

    /// Earliest finish time of the last task in the chain; zero for an
    /// empty graph.
    pub fn makespan(&self) -> f64 {
        match self.tasks.last() {
            Some(last) => self
                .get_time(last, TimepointKind::Finish, true)
                .unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Total waiting time between consecutive tasks when every timepoint
    /// executes at its earliest bound.
    pub fn idle_time(&self) -> f64 {
        let mut idle = 0.0;
        for p in 1..self.tasks.len() {
            let prev_finish = self.earliest(1 + NODES_PER_TASK * (p - 1) + 2);
            let nav = self.earliest(1 + NODES_PER_TASK * p);
            idle += (nav - prev_finish).max(0.0);
        }
        idle
    }

    /// Sum of `latest - earliest` over every task timepoint. Saturates
    /// at `f64::INFINITY` when any timepoint is unbounded above.
    pub fn total_slack(&self) -> f64 {
        let mut slack = 0.0;
        for node in 1..self.dist.len() {
            let window = self.latest(node) - self.earliest(node);
            if window.is_infinite() {
                return f64::INFINITY;
            }
            slack += window;
        }
        slack
    }

    /// Fraction of task timepoints whose execution window has collapsed
    /// to a single instant. Zero for an empty graph.
    pub fn rigidity(&self) -> f64 {
        let n = self.dist.len() - 1;
        if n == 0 {
            return 0.0;
        }
        let rigid = (1..self.dist.len())
            .filter(|&node| self.latest(node) - self.earliest(node) < SLACK_EPSILON)
            .count();
        rigid as f64 / n as f64
    }
}
