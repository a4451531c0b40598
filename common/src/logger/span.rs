use tracing::{Level, Span};
use uuid::Uuid;

/// Span covering the processing of one auction round; events inside it
/// carry the round id without repeating the field at every call site.
pub fn round_span(round_id: Uuid) -> Span {
    tracing::span!(Level::INFO, "round", round_id = %round_id)
}

/// Span covering one robot's bid computation.
pub fn robot_span(robot_id: &str) -> Span {
    tracing::span!(Level::INFO, "bidder", robot_id)
}
