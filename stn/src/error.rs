use thiserror::Error;

/// Errors from structural edits and solving of a temporal network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StnError {
    /// Insertion or removal at a position outside the contiguous range.
    #[error("invalid position {position}: expected 1..={max}")]
    InvalidPosition { position: usize, max: usize },

    /// The constraint graph contains a negative cycle; no assignment of
    /// execution times satisfies it.
    #[error("temporal network is inconsistent")]
    Inconsistent,
}
