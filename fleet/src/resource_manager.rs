//! Composition root for the auction: builds the auctioneer and one
//! bidder per robot, wired over in-process channels by explicit
//! dependency injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use allocation::{Auctioneer, Bidder, BiddingRule};
use timetable::store::{TaskStore, TimetableStore};
use timetable::{Task, Timetable};

use crate::config::FleetConfig;

pub struct ResourceManager {
    pub auctioneer: Auctioneer,
    robot_ids: Vec<String>,
}

impl ResourceManager {
    /// Restore (or create) every robot's timetable, wire the channels
    /// and hand back the bidders so the caller can spawn them.
    pub async fn setup(
        config: &FleetConfig,
        task_store: Arc<dyn TaskStore>,
        timetable_store: Arc<dyn TimetableStore>,
    ) -> anyhow::Result<(Self, Vec<Bidder>)> {
        let zero_timepoint = common::time::today_midnight();
        let bidding_rule =
            BiddingRule::new(&config.bidding_robustness, &config.bidding_temporal)?;

        tracing::info!(
            allocation_method = %config.allocation_method,
            stp_solver = %config.stp_solver,
            n_robots = config.robot_ids.len(),
            "configuring resource manager"
        );

        let (auction_tx, auction_rx) = mpsc::channel(64);
        let mut subscribers = Vec::new();
        let mut bidders = Vec::new();
        let mut timetables = HashMap::new();

        for robot_id in &config.robot_ids {
            let timetable = match timetable_store.get_timetable(robot_id).await {
                Ok(Some(stored)) => stored,
                Ok(None) => Timetable::new(robot_id, zero_timepoint),
                Err(error) => {
                    tracing::warn!(%robot_id, "could not restore timetable: {error}");
                    Timetable::new(robot_id, zero_timepoint)
                }
            };

            if let Err(error) = timetable_store.save_timetable(&timetable).await {
                tracing::warn!(%robot_id, "could not persist timetable: {error}");
            }

            let (tx, rx) = mpsc::channel(64);
            subscribers.push(tx);
            timetables.insert(robot_id.clone(), timetable.clone());
            bidders.push(Bidder::new(
                timetable,
                bidding_rule,
                task_store.clone(),
                auction_tx.clone(),
                rx,
            ));
        }

        let auctioneer = Auctioneer::new(
            timetables,
            zero_timepoint,
            config.round_time,
            config.alternative_timeslots,
            subscribers,
            auction_rx,
            task_store,
            timetable_store,
        );

        let manager = Self {
            auctioneer,
            robot_ids: config.robot_ids.clone(),
        };
        Ok((manager, bidders))
    }

    pub fn robot_ids(&self) -> &[String] {
        &self.robot_ids
    }

    /// Queue tasks for the next auction rounds.
    pub async fn allocate(&mut self, tasks: Vec<Task>) {
        self.auctioneer.allocate(tasks).await;
    }

    /// Periodic tick loop; runs until the task is aborted.
    pub async fn run(mut self, tick_interval: Duration) {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            ticker.tick().await;
            self.auctioneer.tick().await;
        }
    }
}
