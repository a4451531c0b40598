//! Simple Temporal Network for a single robot.
//!
//! Node 0 is the zero timepoint. Each task at position `p` contributes
//! three nodes (navigation, start, finish) chained after the previous
//! task's finish node. Positions are contiguous 1-based integers in
//! insertion order.
//
//  This module is deliberately pure: no async, no IO.

use serde::{Deserialize, Serialize};

use crate::TaskId;
use crate::dispatchable::DispatchableGraph;
use crate::error::StnError;

/// Interval bounds in seconds relative to the zero timepoint.
/// The upper bound may be `f64::INFINITY` (no upper bound).
pub type Interval = (f64, f64);

pub(crate) const NODES_PER_TASK: usize = 3;

/// The three timepoints an inserted task contributes to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimepointKind {
    Navigation,
    Start,
    Finish,
}

impl TimepointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimepointKind::Navigation => "navigation",
            TimepointKind::Start => "start",
            TimepointKind::Finish => "finish",
        }
    }

    pub(crate) fn offset(&self) -> usize {
        match self {
            TimepointKind::Navigation => 0,
            TimepointKind::Start => 1,
            TimepointKind::Finish => 2,
        }
    }
}

/// Constraint bundle for one task, already translated to seconds from
/// the zero timepoint by the owning timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTimepoints {
    pub task_id: TaskId,
    /// Absolute window for the navigation timepoint.
    #[serde(with = "crate::encoding::interval")]
    pub navigation: Interval,
    /// Absolute window for the start timepoint.
    #[serde(with = "crate::encoding::interval")]
    pub start: Interval,
    /// Absolute window for the finish timepoint.
    #[serde(with = "crate::encoding::interval")]
    pub finish: Interval,
    /// Travel duration bounds (navigation -> start).
    #[serde(with = "crate::encoding::interval")]
    pub travel_time: Interval,
    /// Work duration bounds (start -> finish).
    #[serde(with = "crate::encoding::interval")]
    pub work_time: Interval,
}

/// The network itself: an ordered chain of task constraint bundles.
///
/// The full labelled graph (absolute edges from node 0, duration edges
/// inside each task, sequencing edges between consecutive tasks) is
/// derived from the chain when solving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stn {
    chain: Vec<TaskTimepoints>,
}

impl Stn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently in the network.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Splice a task into position `position`, shifting later tasks one
    /// position up. Valid positions are `1..=len+1`.
    pub fn insert(&mut self, timepoints: TaskTimepoints, position: usize) -> Result<(), StnError> {
        let max = self.chain.len() + 1;
        if position < 1 || position > max {
            return Err(StnError::InvalidPosition { position, max });
        }
        self.chain.insert(position - 1, timepoints);
        Ok(())
    }

    /// Inverse of [`Stn::insert`]: removes the task at `position` and
    /// re-links its neighbours. Valid positions are `1..=len`.
    pub fn remove(&mut self, position: usize) -> Result<TaskTimepoints, StnError> {
        let max = self.chain.len();
        if position < 1 || position > max {
            return Err(StnError::InvalidPosition { position, max });
        }
        Ok(self.chain.remove(position - 1))
    }

    /// Task ids in position order.
    pub fn get_tasks(&self) -> Vec<TaskId> {
        self.chain.iter().map(|t| t.task_id.clone()).collect()
    }

    /// 1-based position of a task, if present.
    pub fn position_of(&self, task_id: &str) -> Option<usize> {
        self.chain
            .iter()
            .position(|t| t.task_id == task_id)
            .map(|i| i + 1)
    }

    fn node_count(&self) -> usize {
        1 + NODES_PER_TASK * self.chain.len()
    }

    /// Run all-pairs shortest paths (Floyd-Warshall) over the constraint
    /// graph, producing the minimal dispatchable form, or
    /// [`StnError::Inconsistent`] if any negative cycle exists.
    pub fn solve(&self) -> Result<DispatchableGraph, StnError> {
        let n = self.node_count();
        let mut dist = vec![vec![f64::INFINITY; n]; n];
        for (i, row) in dist.iter_mut().enumerate() {
            row[i] = 0.0;
        }

        for (idx, task) in self.chain.iter().enumerate() {
            let nav = 1 + NODES_PER_TASK * idx;
            let (start, finish) = (nav + 1, nav + 2);

            constrain(&mut dist, 0, nav, task.navigation);
            constrain(&mut dist, 0, start, task.start);
            constrain(&mut dist, 0, finish, task.finish);

            constrain(&mut dist, nav, start, task.travel_time);
            constrain(&mut dist, start, finish, task.work_time);

            // Sequencing: the previous finish (node 0 for the first task)
            // must not come after this navigation.
            let prev_finish = if idx == 0 { 0 } else { nav - 1 };
            constrain(&mut dist, prev_finish, nav, (0.0, f64::INFINITY));
        }

        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    let via = sat_add(dist[i][k], dist[k][j]);
                    if via < dist[i][j] {
                        dist[i][j] = via;
                    }
                }
            }
        }

        if (0..n).any(|i| dist[i][i] < 0.0) {
            return Err(StnError::Inconsistent);
        }

        Ok(DispatchableGraph::new(self.get_tasks(), dist))
    }
}

/// Record the constraint `lb <= to - from <= ub` in the distance matrix,
/// tightening any existing bounds.
fn constrain(dist: &mut [Vec<f64>], from: usize, to: usize, (lb, ub): Interval) {
    dist[from][to] = dist[from][to].min(ub);
    dist[to][from] = dist[to][from].min(-lb);
}

/// Addition saturating at `+INFINITY`. Lower bounds are always finite, so
/// `-INFINITY` never enters the matrix and no NaN can be produced.
fn sat_add(a: f64, b: f64) -> f64 {
    if a.is_infinite() || b.is_infinite() {
        f64::INFINITY
    } else {
        a + b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timepoints(task_id: &str, start_lb: f64, start_ub: f64) -> TaskTimepoints {
        TaskTimepoints {
            task_id: task_id.to_string(),
            navigation: (0.0, f64::INFINITY),
            start: (start_lb, start_ub),
            finish: (0.0, f64::INFINITY),
            travel_time: (580.0, 620.0),
            work_time: (290.0, 310.0),
        }
    }

    #[test]
    fn insert_outside_valid_range_is_rejected() {
        let mut stn = Stn::new();

        assert_eq!(
            stn.insert(timepoints("t1", 0.0, 100.0), 0),
            Err(StnError::InvalidPosition { position: 0, max: 1 })
        );
        assert_eq!(
            stn.insert(timepoints("t1", 0.0, 100.0), 2),
            Err(StnError::InvalidPosition { position: 2, max: 1 })
        );

        assert!(stn.insert(timepoints("t1", 0.0, 100.0), 1).is_ok());
        assert_eq!(
            stn.insert(timepoints("t2", 0.0, 100.0), 3),
            Err(StnError::InvalidPosition { position: 3, max: 2 })
        );
    }

    #[test]
    fn positions_stay_contiguous_in_insertion_order() {
        let mut stn = Stn::new();

        stn.insert(timepoints("a", 0.0, 100.0), 1).unwrap();
        stn.insert(timepoints("c", 0.0, 100.0), 2).unwrap();
        stn.insert(timepoints("b", 0.0, 100.0), 2).unwrap();

        assert_eq!(stn.get_tasks(), vec!["a", "b", "c"]);
        assert_eq!(stn.position_of("a"), Some(1));
        assert_eq!(stn.position_of("b"), Some(2));
        assert_eq!(stn.position_of("c"), Some(3));
        assert_eq!(stn.position_of("missing"), None);
    }

    #[test]
    fn remove_relinks_neighbours() {
        let mut stn = Stn::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            stn.insert(timepoints(id, 0.0, 1000.0), i + 1).unwrap();
        }

        let removed = stn.remove(2).unwrap();
        assert_eq!(removed.task_id, "b");
        assert_eq!(stn.get_tasks(), vec!["a", "c"]);
        assert_eq!(stn.position_of("c"), Some(2));

        assert_eq!(
            stn.remove(3),
            Err(StnError::InvalidPosition { position: 3, max: 2 })
        );
    }

    #[test]
    fn insert_then_reverse_removals_restore_prior_state() {
        let mut stn = Stn::new();
        stn.insert(timepoints("a", 100.0, 200.0), 1).unwrap();
        let snapshot = stn.clone();

        stn.insert(timepoints("b", 300.0, 400.0), 2).unwrap();
        stn.insert(timepoints("c", 500.0, 600.0), 1).unwrap();
        stn.remove(1).unwrap();
        stn.remove(2).unwrap();

        assert_eq!(stn, snapshot);
    }

    #[test]
    fn solve_single_task_yields_tight_window() {
        let mut stn = Stn::new();
        stn.insert(timepoints("t1", 28_800.0, 32_400.0), 1).unwrap();

        let graph = stn.solve().unwrap();

        let earliest_start = graph.get_time("t1", TimepointKind::Start, true).unwrap();
        let latest_start = graph.get_time("t1", TimepointKind::Start, false).unwrap();
        assert_eq!(earliest_start, 28_800.0);
        assert_eq!(latest_start, 32_400.0);

        // Navigation can begin no earlier than the longest travel ahead
        // of the earliest start allows.
        let earliest_nav = graph
            .get_time("t1", TimepointKind::Navigation, true)
            .unwrap();
        assert_eq!(earliest_nav, 28_180.0);

        let earliest_finish = graph.get_time("t1", TimepointKind::Finish, true).unwrap();
        assert_eq!(earliest_finish, 29_090.0);
    }

    #[test]
    fn solve_reports_inconsistency_on_conflicting_windows() {
        let mut stn = Stn::new();
        // Second task must finish before the first one can even start.
        stn.insert(timepoints("late", 10_000.0, 10_100.0), 1).unwrap();
        let mut early = timepoints("early", 0.0, 500.0);
        early.finish = (0.0, 600.0);
        stn.insert(early, 2).unwrap();

        assert_eq!(stn.solve(), Err(StnError::Inconsistent));
    }

    #[test]
    fn solve_sequences_consecutive_tasks() {
        let mut stn = Stn::new();
        stn.insert(timepoints("first", 1_000.0, 2_000.0), 1).unwrap();
        stn.insert(timepoints("second", 0.0, f64::INFINITY), 2).unwrap();

        let graph = stn.solve().unwrap();

        let first_finish = graph.get_time("first", TimepointKind::Finish, true).unwrap();
        let second_nav = graph
            .get_time("second", TimepointKind::Navigation, true)
            .unwrap();
        assert!(second_nav >= first_finish);
    }
}
