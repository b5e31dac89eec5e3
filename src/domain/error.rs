//! Engine error taxonomy
//!
//! Every failure leaves the lot untouched; none is retried by the engine.

use crate::domain::types::SpotId;
use chrono::{DateTime, Utc};

/// Largest page a listing may request
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotError {
    /// Every spot is occupied; the caller may retry after a check-out
    #[error("No free space")]
    LotFull,

    /// The referenced spot holds no vehicle
    #[error("Vehicle not found in location.")]
    LocationEmpty { spot: SpotId },

    #[error("Start must be between 1 and {total_spots}")]
    PaginationStart { total_spots: u32 },

    #[error("Limit must be between 1 and {}", MAX_PAGE_LIMIT)]
    PaginationLimit,

    /// Check-out time precedes check-in time (clock went backwards)
    #[error("Finish time {end} precedes start time {start}")]
    InvalidInterval { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("Invalid tariff (Available options: {})", .available.join(", "))]
    UnknownTariff { tariff: String, available: Vec<String> },

    /// Shrinking would orphan a parked vehicle
    #[error("Cannot reduce lot to {requested} spots while spot {highest_occupied} is occupied")]
    ShrinkBelowOccupied { requested: u32, highest_occupied: SpotId },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl LotError {
    /// True for errors caused by the request itself rather than lot state
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::PaginationStart { .. }
                | Self::PaginationLimit
                | Self::UnknownTariff { .. }
                | Self::InvalidConfiguration(_)
        )
    }
}
