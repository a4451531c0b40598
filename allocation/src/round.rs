//! One auction iteration: collect bids while open, then elect a single
//! winning (task, robot, position) triple.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use stn::TaskId;
use timetable::{RobotId, Task};

use crate::bid::{Bid, robot_index};
use crate::error::AllocationError;

/// Lifecycle: Fresh -> Open -> Closed -> Finished (terminal).
///
/// A fresh round counts as finished: it is the idle placeholder the
/// auctioneer holds between auctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundPhase {
    Fresh,
    Open,
    Closed,
    Finished,
}

#[derive(Debug)]
pub struct Round {
    id: Uuid,
    tasks_to_allocate: HashMap<TaskId, Task>,
    round_time: Duration,
    n_robots: usize,
    alternative_timeslots: bool,
    phase: RoundPhase,
    closure_time: Option<Instant>,
    /// Best bid seen so far per task; only ever replaced by a strictly
    /// better one.
    received_bids: HashMap<TaskId, Bid>,
    received_no_bids: HashMap<TaskId, usize>,
    /// Winning task and bid of the election, kept so the auctioneer can
    /// mirror alternative-timeslot outcomes too.
    winning: Option<(Task, Bid)>,
}

/// What a successful election hands back to the auctioneer.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub task: Task,
    pub robot_id: RobotId,
    pub position: usize,
    pub remaining_tasks: HashMap<TaskId, Task>,
}

impl Round {
    pub fn new(
        tasks_to_allocate: HashMap<TaskId, Task>,
        round_time: Duration,
        n_robots: usize,
        alternative_timeslots: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tasks_to_allocate,
            round_time,
            n_robots,
            alternative_timeslots,
            phase: RoundPhase::Fresh,
            closure_time: None,
            received_bids: HashMap::new(),
            received_no_bids: HashMap::new(),
            winning: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened(&self) -> bool {
        self.phase == RoundPhase::Open
    }

    pub fn finished(&self) -> bool {
        matches!(self.phase, RoundPhase::Fresh | RoundPhase::Finished)
    }

    /// Tasks still waiting for allocation, including any soft-constraint
    /// downgrades applied during the election.
    pub fn pending_tasks(&self) -> HashMap<TaskId, Task> {
        self.tasks_to_allocate.clone()
    }

    /// The elected (task, bid) pair, present after `get_result` found a
    /// winner -- also on the alternative-timeslot path.
    pub fn winning(&self) -> Option<&(Task, Bid)> {
        self.winning.as_ref()
    }

    /// Fresh -> Open. Records the closure deadline.
    pub fn start(&mut self) {
        debug_assert_eq!(self.phase, RoundPhase::Fresh);
        self.closure_time = Some(Instant::now() + self.round_time);
        self.phase = RoundPhase::Open;
        tracing::debug!(round_id = %self.id, "round opened");
    }

    /// Register an incoming bid. Bids outside the open phase are
    /// silently dropped.
    pub fn process_bid(&mut self, bid: Bid) {
        if self.phase != RoundPhase::Open {
            tracing::debug!(
                round_id = %self.id,
                robot_id = %bid.robot_id,
                "dropping bid outside open phase"
            );
            return;
        }

        if bid.is_no_bid() {
            *self.received_no_bids.entry(bid.task_id.clone()).or_insert(0) += 1;
            return;
        }

        tracing::debug!(
            robot_id = %bid.robot_id,
            task_id = %bid.task_id,
            risk_metric = bid.risk_metric,
            temporal_metric = bid.temporal_metric,
            "processing bid"
        );

        match self.received_bids.get(&bid.task_id) {
            Some(current) if !update_task_bid(&bid, current) => {}
            _ => {
                self.received_bids.insert(bid.task_id.clone(), bid);
            }
        }
    }

    /// Open -> Closed once the closure deadline has passed.
    pub fn time_to_close(&mut self) -> bool {
        if self.phase != RoundPhase::Open {
            return false;
        }
        match self.closure_time {
            Some(closure) if Instant::now() >= closure => {
                self.phase = RoundPhase::Closed;
                tracing::debug!(round_id = %self.id, "round closed");
                true
            }
            _ => false,
        }
    }

    /// Elect the winner of a closed round.
    ///
    /// When alternative timeslots are enabled, any task every robot
    /// no-bid on is first downgraded to soft constraints so the next
    /// round may place it outside its original window.
    pub fn get_result(&mut self) -> Result<RoundResult, AllocationError> {
        debug_assert_eq!(self.phase, RoundPhase::Closed);

        if self.alternative_timeslots && !self.received_no_bids.is_empty() {
            self.set_soft_constraints();
        }

        let Some(winning_bid) = self.elect_winner() else {
            return Err(AllocationError::NoAllocation { round_id: self.id });
        };

        let Some(task) = self.tasks_to_allocate.remove(&winning_bid.task_id) else {
            tracing::warn!(task_id = %winning_bid.task_id, "winning bid for unknown task");
            return Err(AllocationError::NoAllocation { round_id: self.id });
        };

        let result = RoundResult {
            task: task.clone(),
            robot_id: winning_bid.robot_id.clone(),
            position: winning_bid.position,
            remaining_tasks: self.tasks_to_allocate.clone(),
        };

        let hard = winning_bid.hard_constraints;
        let alternative = AllocationError::AlternativeTimeSlot {
            task_id: task.task_id.clone(),
            robot_id: winning_bid.robot_id.clone(),
            alternative_start_time: winning_bid.alternative_start_time,
        };
        self.winning = Some((task, winning_bid));

        if !hard {
            return Err(alternative);
        }

        Ok(result)
    }

    /// Closed -> Finished.
    pub fn finish(&mut self) {
        self.phase = RoundPhase::Finished;
        tracing::debug!(round_id = %self.id, "round finished");
    }

    /// Downgrade every task that collected a no-bid from each robot.
    fn set_soft_constraints(&mut self) {
        for (task_id, n_no_bids) in &self.received_no_bids {
            if *n_no_bids == self.n_robots {
                if let Some(task) = self.tasks_to_allocate.get_mut(task_id) {
                    task.set_soft_constraints();
                    tracing::debug!(%task_id, "setting soft constraints");
                }
            }
        }
    }

    fn elect_winner(&self) -> Option<Bid> {
        self.received_bids
            .values()
            .min_by(|a, b| a.cmp_cost(b).then_with(|| a.task_id.cmp(&b.task_id)))
            .cloned()
    }
}

/// True when `new` should replace `old` as a task's best bid: strictly
/// lower cost, or equal cost from a lower-numbered robot.
fn update_task_bid(new: &Bid, old: &Bid) -> bool {
    match new.cmp_cost(old) {
        Ordering::Less => true,
        Ordering::Equal => robot_index(&new.robot_id) < robot_index(&old.robot_id),
        Ordering::Greater => false,
    }
}
