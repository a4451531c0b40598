//! Central orchestrator of the auction. Holds the queue of tasks to
//! allocate, opens one round at a time, elects winners, mirrors every
//! robot's timetable and publishes allocations to the fleet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use stn::{TaskId, TimepointKind};
use timetable::store::{TaskStore, TimetableStore};
use timetable::{RobotId, Task, TaskStatus, TimepointConstraint, Timetable};

use crate::error::AllocationError;
use crate::messages::{Allocation, Message, Payload, TaskAnnouncement};
use crate::round::{Round, RoundResult};

/// An allocation outside the task's original window, parked until an
/// operator confirms it.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeAllocation {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub alternative_start_time: Option<DateTime<Utc>>,
}

/// Dispatch times of an allocated task, read from the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSchedule {
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
}

pub struct Auctioneer {
    robot_ids: Vec<RobotId>,
    /// Authoritative mirror of every robot's timetable.
    timetables: HashMap<RobotId, Timetable>,
    tasks_to_allocate: HashMap<TaskId, Task>,
    allocations: Vec<(TaskId, Vec<RobotId>)>,
    waiting_for_user_confirmation: Vec<AlternativeAllocation>,
    round: Round,
    zero_timepoint: DateTime<Utc>,
    round_time: Duration,
    alternative_timeslots: bool,
    /// One channel per subscribed bidder; announcements and allocations
    /// fan out to all of them.
    subscribers: Vec<mpsc::Sender<Message>>,
    /// Peer-directed messages from the bidders (bids, finish-round).
    rx: mpsc::Receiver<Message>,
    task_store: Arc<dyn TaskStore>,
    timetable_store: Arc<dyn TimetableStore>,
    /// Robots whose committed schedule was touched by a new allocation;
    /// the dispatching layer consumes these to re-schedule.
    reschedule_tx: Option<mpsc::Sender<RobotId>>,
}

impl Auctioneer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timetables: HashMap<RobotId, Timetable>,
        zero_timepoint: DateTime<Utc>,
        round_time: Duration,
        alternative_timeslots: bool,
        subscribers: Vec<mpsc::Sender<Message>>,
        rx: mpsc::Receiver<Message>,
        task_store: Arc<dyn TaskStore>,
        timetable_store: Arc<dyn TimetableStore>,
    ) -> Self {
        let mut robot_ids: Vec<RobotId> = timetables.keys().cloned().collect();
        robot_ids.sort();
        tracing::debug!(n_robots = robot_ids.len(), "starting auctioneer");

        Self {
            robot_ids,
            timetables,
            tasks_to_allocate: HashMap::new(),
            allocations: Vec::new(),
            waiting_for_user_confirmation: Vec::new(),
            round: Round::new(HashMap::new(), round_time, 0, alternative_timeslots),
            zero_timepoint,
            round_time,
            alternative_timeslots,
            subscribers,
            rx,
            task_store,
            timetable_store,
            reschedule_tx: None,
        }
    }

    /// Attach the seam towards the external scheduler component.
    pub fn with_reschedule_tx(mut self, reschedule_tx: mpsc::Sender<RobotId>) -> Self {
        self.reschedule_tx = Some(reschedule_tx);
        self
    }

    pub fn robot_ids(&self) -> &[RobotId] {
        &self.robot_ids
    }

    pub fn timetables(&self) -> &HashMap<RobotId, Timetable> {
        &self.timetables
    }

    pub fn tasks_to_allocate(&self) -> &HashMap<TaskId, Task> {
        &self.tasks_to_allocate
    }

    pub fn allocations(&self) -> &[(TaskId, Vec<RobotId>)] {
        &self.allocations
    }

    pub fn waiting_for_user_confirmation(&self) -> &[AlternativeAllocation] {
        &self.waiting_for_user_confirmation
    }

    pub fn round_opened(&self) -> bool {
        self.round.opened()
    }

    /// Queue tasks for allocation and persist them. Persistence failures
    /// are warnings; in-memory state stays authoritative.
    pub async fn allocate(&mut self, tasks: Vec<Task>) {
        for task in tasks {
            if let Err(error) = self.task_store.save_task(&task).await {
                tracing::warn!(task_id = %task.task_id, "could not persist task: {error}");
            }
            self.tasks_to_allocate.insert(task.task_id.clone(), task);
        }
        tracing::debug!(pending = self.tasks_to_allocate.len(), "auctioneer received tasks");
    }

    /// One cooperative step: drain incoming messages, then advance the
    /// round state machine.
    pub async fn tick(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
        }
        self.advance().await;
    }

    fn dispatch(&mut self, message: Message) {
        let _span = common::logger::round_span(self.round.id()).entered();
        match message.payload {
            Payload::Bid(bid) => self.round.process_bid(bid),
            Payload::FinishRound(finish) => {
                tracing::debug!(robot_id = %finish.robot_id, "finish-round received");
                self.round.finish();
            }
            _ => {}
        }
    }

    async fn advance(&mut self) {
        if !self.tasks_to_allocate.is_empty() && self.round.finished() {
            self.announce_task().await;
            return;
        }

        if self.round.opened() && self.round.time_to_close() {
            let outcome = self.round.get_result();
            self.tasks_to_allocate = self.round.pending_tasks();

            match outcome {
                Ok(result) => self.process_allocation(result).await,
                Err(AllocationError::NoAllocation { round_id }) => {
                    tracing::warn!(%round_id, "no allocation in round");
                    self.round.finish();
                }
                Err(AllocationError::AlternativeTimeSlot {
                    task_id,
                    robot_id,
                    alternative_start_time,
                }) => {
                    self.process_alternative_allocation(task_id, robot_id, alternative_start_time)
                        .await;
                    self.round.finish();
                }
            }
        }
    }

    /// Open a new round and broadcast every pending (non-frozen) task
    /// together with the zero timepoint.
    async fn announce_task(&mut self) {
        let announced: HashMap<TaskId, Task> = self
            .tasks_to_allocate
            .iter()
            .filter(|(_, task)| !task.frozen)
            .map(|(id, task)| (id.clone(), task.clone()))
            .collect();
        if announced.is_empty() {
            return;
        }

        self.round = Round::new(
            announced.clone(),
            self.round_time,
            self.robot_ids.len(),
            self.alternative_timeslots,
        );

        tracing::info!(
            round_id = %self.round.id(),
            n_tasks = announced.len(),
            "starting round"
        );
        let tasks: Vec<Task> = announced.values().cloned().collect();
        if let Some(earliest) = Task::earliest_task(&tasks) {
            tracing::debug!(task_id = %earliest.task_id, "earliest announced task");
        }

        let announcement = TaskAnnouncement {
            round_id: self.round.id(),
            zero_timepoint: self.zero_timepoint,
            earliest_admissible_time: Utc::now(),
            tasks: announced,
        };

        self.round.start();
        self.publish(Message::new(Payload::TaskAnnouncement(announcement)))
            .await;
    }

    async fn process_allocation(&mut self, result: RoundResult) {
        let RoundResult {
            task,
            robot_id,
            position,
            ..
        } = result;

        tracing::debug!(
            task_id = %task.task_id,
            robot_id = %robot_id,
            position,
            "allocation"
        );

        self.allocations
            .push((task.task_id.clone(), vec![robot_id.clone()]));

        if let Err(error) = self
            .task_store
            .update_task_status(&task.task_id, TaskStatus::Allocated)
            .await
        {
            tracing::warn!(task_id = %task.task_id, "could not persist task status: {error}");
        }

        self.update_timetable(&robot_id, &task, position).await;
        self.announce_winner(&task.task_id, &robot_id).await;
    }

    /// Authoritative mirror update: re-apply the winning insertion and
    /// re-solve, arriving at the same timetable the bidder committed.
    async fn update_timetable(&mut self, robot_id: &str, task: &Task, position: usize) {
        let zero_timepoint = self.zero_timepoint;
        let timetable = self
            .timetables
            .entry(robot_id.to_string())
            .or_insert_with(|| Timetable::new(robot_id, zero_timepoint));

        if let Err(error) = timetable.add_task(task, position) {
            tracing::error!(robot_id, task_id = %task.task_id, "mirror insertion failed: {error}");
            return;
        }
        if let Err(error) = timetable.solve_stp() {
            tracing::error!(robot_id, task_id = %task.task_id, "mirror solve failed: {error}");
            return;
        }

        tracing::debug!(robot_id, tasks = ?timetable.tasks(), "mirror updated");

        if timetable.is_scheduled() {
            // The committed next dispatch may have moved; hand the robot
            // to the external scheduler for re-scheduling.
            if let Some(reschedule_tx) = &self.reschedule_tx {
                if reschedule_tx.send(robot_id.to_string()).await.is_err() {
                    tracing::warn!(robot_id, "re-scheduling channel closed");
                }
            }
        }

        if let Err(error) = self.timetable_store.save_timetable(timetable).await {
            tracing::warn!(robot_id, "could not persist timetable: {error}");
        }
    }

    async fn process_alternative_allocation(
        &mut self,
        task_id: TaskId,
        robot_id: RobotId,
        alternative_start_time: Option<DateTime<Utc>>,
    ) {
        tracing::warn!(
            %task_id,
            %robot_id,
            ?alternative_start_time,
            "alternative timeslot requires operator confirmation"
        );

        // The mirror commits the candidate schedule pending confirmation.
        if let Some((task, bid)) = self.round.winning().cloned() {
            self.update_timetable(&robot_id, &task, bid.position).await;
        }

        self.waiting_for_user_confirmation.push(AlternativeAllocation {
            task_id,
            robot_id,
            alternative_start_time,
        });
    }

    async fn announce_winner(&mut self, task_id: &str, robot_id: &str) {
        tracing::debug!(task_id, robot_id, "announcing winner");
        let allocation = Allocation {
            task_id: task_id.to_string(),
            robot_id: robot_id.to_string(),
        };
        self.publish(Message::new(Payload::Allocation(allocation)))
            .await;
    }

    async fn publish(&self, message: Message) {
        for subscriber in &self.subscribers {
            if subscriber.send(message.clone()).await.is_err() {
                tracing::warn!("subscriber channel closed");
            }
        }
    }

    /// Start navigation time of an allocated task, read from the mirror.
    /// The finish time is not known at allocation level.
    pub fn get_task_schedule(&self, task_id: &str, robot_id: &str) -> Option<TaskSchedule> {
        let timetable = self.timetables.get(robot_id)?;
        let graph = timetable.dispatchable_graph.as_ref()?;
        let start = graph.get_time(task_id, TimepointKind::Navigation, true)?;

        Some(TaskSchedule {
            start_time: TimepointConstraint::absolute_time(timetable.zero_timepoint, start),
            finish_time: None,
        })
    }
}
