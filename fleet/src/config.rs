use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FleetConfig {
    /// Database connection string.
    pub database_url: String,

    /// Robots taking part in the auction, one bidder each.
    pub robot_ids: Vec<String>,

    // =========================
    // Auction configuration
    // =========================
    /// Name of the bidding policy pair in use; recorded with every
    /// allocation for traceability.
    pub allocation_method: String,

    /// How long a round stays open for bids.
    ///
    /// Too short and slow bidders are effectively excluded; too long
    /// and the queue of pending tasks drains slowly (one task is
    /// allocated per round).
    pub round_time: Duration,

    /// When enabled, a task every robot no-bids on is downgraded to
    /// soft constraints and re-auctioned outside its original window
    /// (the resulting allocation waits for operator confirmation).
    pub alternative_timeslots: bool,

    /// STP solver variant identifier, forwarded opaquely.
    pub stp_solver: String,

    /// Robustness half of the bidding rule (srea | fpc | dsc).
    pub bidding_robustness: String,

    /// Temporal half of the bidding rule
    /// (completion_time | makespan | idle_time).
    pub bidding_temporal: String,
}

impl FleetConfig {
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://fleet_dev.db".to_string());

        let robot_ids = std::env::var("FLEET_ROBOTS")
            .unwrap_or_else(|_| "robot_001".to_string())
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let round_time_secs = std::env::var("FLEET_ROUND_TIME")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(5);

        let alternative_timeslots = std::env::var("FLEET_ALTERNATIVE_TIMESLOTS")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            database_url,
            robot_ids,
            allocation_method: std::env::var("FLEET_ALLOCATION_METHOD")
                .unwrap_or_else(|_| "tessi".to_string()),
            round_time: Duration::from_secs(round_time_secs),
            alternative_timeslots,
            stp_solver: std::env::var("FLEET_STP_SOLVER").unwrap_or_else(|_| "fpc".to_string()),
            bidding_robustness: std::env::var("FLEET_BIDDING_ROBUSTNESS")
                .unwrap_or_else(|_| "fpc".to_string()),
            bidding_temporal: std::env::var("FLEET_BIDDING_TEMPORAL")
                .unwrap_or_else(|_| "completion_time".to_string()),
        }
    }
}
