//! Robot-side participant of the auction. Listens for task
//! announcements, trials every insertion position, publishes a single
//! smallest bid (plus one no-bid per infeasible task) and commits the
//! winning candidate timetable on allocation.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use timetable::store::TaskStore;
use timetable::{RobotId, Task, TaskStatus, Timetable};

use crate::bid::Bid;
use crate::bidding_rule::BiddingRule;
use crate::messages::{Allocation, FinishRound, Message, Payload, TaskAnnouncement};

pub struct Bidder {
    robot_id: RobotId,
    timetable: Timetable,
    bidding_rule: BiddingRule,
    task_store: Arc<dyn TaskStore>,
    auctioneer_tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    /// Best bid published in the current round.
    bid_placed: Option<Bid>,
}

impl Bidder {
    pub fn new(
        timetable: Timetable,
        bidding_rule: BiddingRule,
        task_store: Arc<dyn TaskStore>,
        auctioneer_tx: mpsc::Sender<Message>,
        rx: mpsc::Receiver<Message>,
    ) -> Self {
        let robot_id = timetable.robot_id.clone();
        tracing::debug!(%robot_id, "bidder initialized");
        Self {
            robot_id,
            timetable,
            bidding_rule,
            task_store,
            auctioneer_tx,
            rx,
            bid_placed: None,
        }
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    /// The committed timetable (not any in-flight trial state).
    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    /// Message loop; returns when the announcement channel closes.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            self.handle(message).await;
        }
        tracing::debug!(robot_id = %self.robot_id, "bidder channel closed");
    }

    /// Receive the next bus message, if any. Used by drivers that step
    /// the bidder manually instead of spawning [`Bidder::run`].
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Bidder::recv`].
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub async fn handle(&mut self, message: Message) {
        match message.payload {
            Payload::TaskAnnouncement(announcement) => {
                self.on_task_announcement(announcement).await;
            }
            Payload::Allocation(allocation) => self.on_allocation(allocation).await,
            _ => {}
        }
    }

    async fn on_task_announcement(&mut self, announcement: TaskAnnouncement) {
        tracing::debug!(
            robot_id = %self.robot_id,
            round_id = %announcement.round_id,
            "received task announcement"
        );

        self.timetable.zero_timepoint = announcement.zero_timepoint;

        let (smallest_bid, no_bids) = self.compute_bids(&announcement);

        if let Some(bid) = smallest_bid {
            tracing::debug!(
                robot_id = %self.robot_id,
                task_id = %bid.task_id,
                risk_metric = bid.risk_metric,
                temporal_metric = bid.temporal_metric,
                "placing bid"
            );
            self.bid_placed = Some(bid.clone());
            self.send_bid(bid).await;
        }

        for no_bid in no_bids {
            tracing::debug!(
                robot_id = %self.robot_id,
                task_id = %no_bid.task_id,
                "sending no-bid"
            );
            self.send_bid(no_bid).await;
        }
    }

    /// Best bid per announced task, reduced to the single smallest one,
    /// plus a no-bid for every task with no feasible position.
    fn compute_bids(&self, announcement: &TaskAnnouncement) -> (Option<Bid>, Vec<Bid>) {
        let _span = common::logger::robot_span(&self.robot_id).entered();
        let mut bids = Vec::new();
        let mut no_bids = Vec::new();

        let mut tasks: Vec<&Task> = announcement.tasks.values().collect();
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        for task in tasks {
            match self.insert_task(task, announcement.round_id) {
                Some(bid) => bids.push(bid),
                None => no_bids.push(Bid::no_bid(
                    &self.robot_id,
                    announcement.round_id,
                    &task.task_id,
                )),
            }
        }

        (smallest_bid(bids), no_bids)
    }

    /// Trial-insert `task` at every admissible position and keep the
    /// best-scoring feasible bid. Each trial works on its own candidate
    /// clone, so the committed timetable is untouched.
    fn insert_task(&self, task: &Task, round_id: Uuid) -> Option<Bid> {
        let mut best: Option<Bid> = None;
        let n_tasks = self.timetable.tasks().len();

        for position in 1..=n_tasks + 1 {
            // The committed next task cannot be displaced.
            if position == 1 && self.timetable.is_scheduled() {
                tracing::debug!(position, "skipping committed position");
                continue;
            }

            match self
                .bidding_rule
                .compute_bid(round_id, task, position, &self.timetable)
            {
                Ok(bid) => {
                    if best.as_ref().is_none_or(|current| bid.prefer(current)) {
                        best = Some(bid);
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        task_id = %task.task_id,
                        position,
                        "stp solver found no solution: {error}"
                    );
                }
            }
        }

        best
    }

    async fn on_allocation(&mut self, allocation: Allocation) {
        if allocation.robot_id != self.robot_id {
            return;
        }
        tracing::debug!(robot_id = %self.robot_id, task_id = %allocation.task_id, "received allocation");
        self.allocate_to_robot(&allocation.task_id).await;
        self.send_finish_round().await;
    }

    /// Adopt the candidate timetable carried in the winning bid and mark
    /// the task as allocated to this robot.
    async fn allocate_to_robot(&mut self, task_id: &str) {
        let Some(bid) = self.bid_placed.as_ref() else {
            tracing::warn!(robot_id = %self.robot_id, task_id, "allocation without a placed bid");
            return;
        };
        if bid.task_id != task_id {
            tracing::warn!(
                robot_id = %self.robot_id,
                task_id,
                placed = %bid.task_id,
                "allocation does not match the placed bid"
            );
            return;
        }
        let Some(snapshot) = bid.timetable.clone() else {
            tracing::warn!(robot_id = %self.robot_id, task_id, "placed bid carries no timetable");
            return;
        };

        self.timetable = snapshot;
        tracing::debug!(
            robot_id = %self.robot_id,
            task_id,
            tasks = ?self.timetable.tasks(),
            "committed winning timetable"
        );

        match self.task_store.get_task(task_id).await {
            Ok(Some(mut task)) => {
                task.status = TaskStatus::Allocated;
                task.assign_robot(&self.robot_id);
                if let Err(error) = self.task_store.save_task(&task).await {
                    tracing::warn!(task_id, "could not persist allocated task: {error}");
                }
            }
            Ok(None) => tracing::warn!(task_id, "allocated task not found in store"),
            Err(error) => tracing::warn!(task_id, "task store unavailable: {error}"),
        }
    }

    async fn send_bid(&self, bid: Bid) {
        if self
            .auctioneer_tx
            .send(Message::new(Payload::Bid(bid)))
            .await
            .is_err()
        {
            tracing::warn!(robot_id = %self.robot_id, "auctioneer channel closed");
        }
    }

    async fn send_finish_round(&self) {
        let finish = FinishRound {
            robot_id: self.robot_id.clone(),
        };
        if self
            .auctioneer_tx
            .send(Message::new(Payload::FinishRound(finish)))
            .await
            .is_err()
        {
            tracing::warn!(robot_id = %self.robot_id, "auctioneer channel closed");
        }
    }
}

/// The single smallest bid across tasks; cost ties fall back to the
/// lexicographically smaller task id.
fn smallest_bid(bids: Vec<Bid>) -> Option<Bid> {
    let mut smallest: Option<Bid> = None;
    for bid in bids {
        if smallest.as_ref().is_none_or(|current| bid.prefer(current)) {
            smallest = Some(bid);
        }
    }
    smallest
}
