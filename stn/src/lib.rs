pub mod dispatchable;
pub mod encoding;
pub mod error;
pub mod graph;

pub use dispatchable::DispatchableGraph;
pub use error::StnError;
pub use graph::{Interval, Stn, TaskTimepoints, TimepointKind};

/// Stable task identifier as it appears on the wire.
pub type TaskId = String;
