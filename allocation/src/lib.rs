pub mod auctioneer;
pub mod bid;
pub mod bidder;
pub mod bidding_rule;
pub mod error;
pub mod messages;
pub mod round;

pub use auctioneer::{AlternativeAllocation, Auctioneer, TaskSchedule};
pub use bid::Bid;
pub use bidder::Bidder;
pub use bidding_rule::BiddingRule;
pub use error::AllocationError;
pub use messages::{Allocation, FinishRound, Message, MessageHeader, Payload, TaskAnnouncement};
pub use round::{Round, RoundResult};
