//! Wire messages exchanged over the allocation bus. Every message is a
//! `header` (type, metamodel, msgId, timestamp) plus one payload kind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::time::now_ms;
use stn::TaskId;
use timetable::{RobotId, Task};

use crate::bid::Bid;

pub const MSG_METAMODEL: &str = "mrta-msg-schema.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub metamodel: String,
    #[serde(rename = "msgId")]
    pub msg_id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Payload,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            header: MessageHeader {
                msg_type: payload.message_type().to_string(),
                metamodel: MSG_METAMODEL.to_string(),
                msg_id: Uuid::new_v4(),
                timestamp: now_ms(),
            },
            payload,
        }
    }
}

/// Variant order matters for untagged deserialization: `Allocation`'s
/// fields are a subset of `Bid`'s, and `FinishRound`'s of `Allocation`'s,
/// so the richer payloads are tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    TaskAnnouncement(TaskAnnouncement),
    Bid(Bid),
    Allocation(Allocation),
    FinishRound(FinishRound),
}

impl Payload {
    pub fn message_type(&self) -> &'static str {
        match self {
            Payload::TaskAnnouncement(_) => "TASK-ANNOUNCEMENT",
            Payload::Bid(_) => "BID",
            Payload::Allocation(_) => "ALLOCATION",
            Payload::FinishRound(_) => "FINISH-ROUND",
        }
    }
}

/// Broadcast by the auctioneer to open a round: every pending task plus
/// the session's zero timepoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnnouncement {
    pub round_id: Uuid,
    pub zero_timepoint: DateTime<Utc>,
    pub earliest_admissible_time: DateTime<Utc>,
    pub tasks: HashMap<TaskId, Task>,
}

/// Broadcast by the auctioneer to claim a winning bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub task_id: TaskId,
    pub robot_id: RobotId,
}

/// Sent by the winning bidder once it has committed its timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishRound {
    pub robot_id: RobotId,
}
