//! The pluggable bidding rule: a robustness metric plus a temporal
//! metric, both selected by configuration string. All metric values are
//! seconds (or dimensionless ratios for robustness) so bids compare
//! uniformly across robots.

use uuid::Uuid;

use stn::{DispatchableGraph, TimepointKind};
use timetable::{NoStpSolution, Task, Timetable};

use crate::bid::Bid;

/// How risky the candidate schedule is, judged from the dispatchable
/// graph's slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobustnessPolicy {
    /// Robustness estimate from remaining slack: more slack, less risk
    /// of a propagated delay.
    Srea,
    /// Full path consistency carries no risk model; bids then compare
    /// on the temporal metric alone.
    Fpc,
    /// Degree of static control: fraction of timepoints whose window
    /// has collapsed.
    Dsc,
}

impl RobustnessPolicy {
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name {
            "srea" => Ok(RobustnessPolicy::Srea),
            "fpc" => Ok(RobustnessPolicy::Fpc),
            "dsc" => Ok(RobustnessPolicy::Dsc),
            other => anyhow::bail!("unknown robustness policy '{}'", other),
        }
    }

    fn evaluate(&self, graph: &DispatchableGraph) -> f64 {
        match self {
            RobustnessPolicy::Fpc => 0.0,
            RobustnessPolicy::Srea => 1.0 / (1.0 + graph.total_slack()),
            RobustnessPolicy::Dsc => graph.rigidity(),
        }
    }
}

/// How expensive the candidate schedule is, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPolicy {
    /// Earliest finish time of the inserted task.
    CompletionTime,
    /// Increase of the schedule's makespan caused by the insertion.
    Makespan,
    /// Total idle time between consecutive tasks after the insertion.
    IdleTime,
}

impl TemporalPolicy {
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name {
            "completion_time" => Ok(TemporalPolicy::CompletionTime),
            "makespan" => Ok(TemporalPolicy::Makespan),
            "idle_time" => Ok(TemporalPolicy::IdleTime),
            other => anyhow::bail!("unknown temporal policy '{}'", other),
        }
    }

    fn evaluate(&self, graph: &DispatchableGraph, task_id: &str, makespan_before: f64) -> f64 {
        match self {
            TemporalPolicy::CompletionTime => graph
                .get_time(task_id, TimepointKind::Finish, true)
                .unwrap_or(f64::INFINITY),
            TemporalPolicy::Makespan => graph.makespan() - makespan_before,
            TemporalPolicy::IdleTime => graph.idle_time(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BiddingRule {
    robustness: RobustnessPolicy,
    temporal: TemporalPolicy,
}

impl BiddingRule {
    pub fn new(robustness: &str, temporal: &str) -> anyhow::Result<Self> {
        Ok(Self {
            robustness: RobustnessPolicy::from_name(robustness)?,
            temporal: TemporalPolicy::from_name(temporal)?,
        })
    }

    /// Score inserting `task` at `position`: clone the timetable, splice
    /// the task in, solve, and read both metrics off the dispatchable
    /// graph. The solved candidate travels inside the returned bid so the
    /// bidder can commit it verbatim on winning.
    pub fn compute_bid(
        &self,
        round_id: Uuid,
        task: &Task,
        position: usize,
        timetable: &Timetable,
    ) -> Result<Bid, NoStpSolution> {
        let makespan_before = timetable
            .dispatchable_graph
            .as_ref()
            .map(|graph| graph.makespan())
            .unwrap_or(0.0);

        let mut candidate = timetable.clone();
        candidate
            .add_task(task, position)
            .map_err(|_| NoStpSolution {
                robot_id: timetable.robot_id.clone(),
            })?;
        candidate.solve_stp()?;

        let (risk_metric, temporal_metric, alternative_start_time) = {
            let Some(graph) = candidate.dispatchable_graph.as_ref() else {
                return Err(NoStpSolution {
                    robot_id: timetable.robot_id.clone(),
                });
            };
            (
                self.robustness.evaluate(graph),
                self.temporal.evaluate(graph, &task.task_id, makespan_before),
                if task.constraints.hard {
                    None
                } else {
                    candidate.earliest_start_time(&task.task_id)
                },
            )
        };

        Ok(Bid {
            robot_id: candidate.robot_id.clone(),
            round_id,
            task_id: task.task_id.clone(),
            position,
            risk_metric,
            temporal_metric,
            alternative_start_time,
            hard_constraints: task.constraints.hard,
            timetable: Some(candidate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use timetable::{InterTimepointConstraint, TransportationRequest};

    fn ztp() -> chrono::DateTime<Utc> {
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
    fn unknown_policy_names_are_rejected() {
        assert!(BiddingRule::new("srea", "completion_time").is_ok());
        assert!(BiddingRule::new("bogus", "completion_time").is_err());
        assert!(BiddingRule::new("srea", "bogus").is_err());
    }

    #[test]
    fn feasible_insertion_scores_and_snapshots() {
        let rule = BiddingRule::new("fpc", "completion_time").unwrap();
        let timetable = Timetable::new("robot_001", ztp());

        let bid = rule
            .compute_bid(Uuid::new_v4(), &sample_task("t1", 8, 9), 1, &timetable)
            .unwrap();

        assert_eq!(bid.risk_metric, 0.0);
        // Earliest finish: 08:00 plus the lower work bound.
        assert_eq!(bid.temporal_metric, 29_090.0);

        let snapshot = bid.timetable.unwrap();
        assert_eq!(snapshot.tasks(), vec!["t1"]);
        assert!(snapshot.dispatchable_graph.is_some());
        // The bidder's own timetable is untouched by the trial.
        assert!(timetable.tasks().is_empty());
    }

    #[test]
    fn infeasible_insertion_reports_no_solution() {
        let rule = BiddingRule::new("fpc", "completion_time").unwrap();
        let timetable = Timetable::new("robot_001", ztp());

        // Delivery deadline before the earliest possible finish.
        let mut task = sample_task("t1", 8, 9);
        task.constraints.update_timepoint_constraint(
            "delivery",
            ztp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 1, 0).single().unwrap(),
        );

        let result = rule.compute_bid(Uuid::new_v4(), &task, 1, &timetable);
        assert!(result.is_err());
    }

    #[test]
    fn soft_task_bid_carries_alternative_start_time() {
        let rule = BiddingRule::new("fpc", "completion_time").unwrap();
        let mut timetable = Timetable::new("robot_001", ztp());
        timetable.add_task(&sample_task("t0", 8, 9), 1).unwrap();
        timetable.solve_stp().unwrap();

        let mut soft = sample_task("t1", 8, 8);
        soft.set_soft_constraints();

        let bid = rule
            .compute_bid(Uuid::new_v4(), &soft, 2, &timetable)
            .unwrap();

        assert!(!bid.hard_constraints);
        let alternative = bid.alternative_start_time.unwrap();
        assert!(alternative > soft.request.latest_pickup_time);
    }

    #[test]
    fn makespan_policy_scores_the_increase() {
        let rule = BiddingRule::new("fpc", "makespan").unwrap();
        let mut timetable = Timetable::new("robot_001", ztp());
        timetable.add_task(&sample_task("t0", 8, 9), 1).unwrap();
        timetable.solve_stp().unwrap();

        let bid = rule
            .compute_bid(Uuid::new_v4(), &sample_task("t1", 10, 11), 2, &timetable)
            .unwrap();

        // Before: t0 finishes earliest at 29090. After: t1 finishes
        // earliest at 36290. The bid pays the difference.
        assert_eq!(bid.temporal_metric, 7_200.0);
    }
}
