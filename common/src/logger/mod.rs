mod init;
mod span;

pub use init::init_logger;
pub use span::{robot_span, round_span};
