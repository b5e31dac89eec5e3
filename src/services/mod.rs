//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `fee` - Tariff-based fee calculation with a free grace period
//! - `lot_manager` - Spot allocation and ticket lifecycle behind one lock
//! - `clock` - Injectable time source

pub mod clock;
pub mod fee;
pub mod lot_manager;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use fee::{compute_fee, FeeCalculator};
pub use lot_manager::{LotManager, LotUpdate};
