//! Domain models - core parking types and ticket model
//!
//! This module contains the canonical data types used throughout the system:
//! - `Ticket` - one parking session, from check-in to check-out
//! - `SpotId` - numbered parking place inside the lot
//! - `Tariff` / `TariffTable` - named billing rules
//! - `Fee` - fixed-point amount charged on check-out
//! - `LotError` - typed failures returned by the engine

pub mod error;
pub mod ticket;
pub mod types;

// Re-export commonly used types at module level
pub use error::LotError;
pub use ticket::{Ticket, TicketRecord};
pub use types::{Fee, SpotId, Tariff, TariffTable};
