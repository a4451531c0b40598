pub mod store;
pub mod task;
pub mod timetable;

pub use task::{
    InterTimepointConstraint, RobotId, Task, TaskStatus, TemporalConstraints, TimepointConstraint,
    TransportationRequest,
};
pub use timetable::{NoStpSolution, Timetable};
