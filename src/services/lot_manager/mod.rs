//! Lot manager - shared, thread-safe front of the lot state machine
//!
//! Serializes every mutation behind one `RwLock`:
//! - check-in, check-out and reconfigure take the write lock
//! - listing and configuration reads take the read lock
//!
//! "Now" is read from the injected clock while the lock is held, so ticket
//! timestamps follow the order in which operations were applied.

mod state;


pub use state::{
    Lot, LotConfiguration, LotUpdate, DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_START, MAX_TOTAL_SPOTS,
};

use crate::domain::error::LotError;
use crate::domain::ticket::Ticket;
use crate::domain::types::{Fee, SpotId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::clock::Clock;
use crate::services::fee::FeeCalculator;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct LotManager {
    lot: RwLock<Lot>,
    fees: FeeCalculator,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl LotManager {
    pub fn new(
        lot: Lot,
        fees: FeeCalculator,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { lot: RwLock::new(lot), fees, clock, metrics }
    }

    /// Build the initial lot from loaded configuration
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, LotError> {
        let lot = Lot::new(config.total_spots(), config.tariffs().clone())?;
        Ok(Self::new(lot, FeeCalculator::new(config.free_minutes()), clock, metrics))
    }

    /// Park `car` on the lowest free spot under `tariff` (case-insensitive)
    pub fn check_in(&self, car: &str, tariff: &str) -> Result<Ticket, LotError> {
        let (result, held_us) = {
            let mut lot = self.lot.write();
            let started = Instant::now();
            let now = self.clock.now();
            (lot.check_in(car, tariff, now), elapsed_us(started))
        };
        self.metrics.record_operation(held_us);

        match &result {
            Ok(ticket) => {
                self.metrics.record_check_in();
                info!(
                    ticket_id = %ticket.id,
                    car = %ticket.car,
                    tariff = %ticket.tariff,
                    spot = %ticket.spot,
                    "car_checked_in"
                );
            }
            Err(LotError::LotFull) => {
                self.metrics.record_lot_full();
                warn!(car = %car, tariff = %tariff, "lot_full");
            }
            Err(e) => self.record_failure("check_in", e),
        }
        result
    }

    /// Vacate `spot` and return the finalized ticket with its fee
    pub fn check_out(&self, spot: SpotId) -> Result<Ticket, LotError> {
        let (result, held_us) = {
            let mut lot = self.lot.write();
            let started = Instant::now();
            let now = self.clock.now();
            (lot.check_out(spot, now, &self.fees), elapsed_us(started))
        };
        self.metrics.record_operation(held_us);

        match &result {
            Ok(ticket) => {
                let fee = ticket.fee.unwrap_or_else(Fee::zero);
                self.metrics.record_check_out(fee.cents());
                info!(
                    ticket_id = %ticket.id,
                    car = %ticket.car,
                    spot = %ticket.spot,
                    tariff = %ticket.tariff,
                    parked_secs = %ticket.parked_duration().map_or(0, |d| d.num_seconds()),
                    fee = %fee,
                    "car_checked_out"
                );
            }
            Err(LotError::LocationEmpty { .. }) => {
                self.metrics.record_location_empty();
                debug!(spot = %spot, "location_empty");
            }
            Err(e) => self.record_failure("check_out", e),
        }
        result
    }

    /// Open tickets for spots `start..start + limit`, ascending
    pub fn list_occupied(&self, start: i64, limit: i64) -> Result<Vec<Ticket>, LotError> {
        let result = self.lot.read().list_occupied(start, limit);
        if let Err(e) = &result {
            self.record_failure("list_occupied", e);
        }
        result
    }

    /// Apply new lot-wide settings; open tickets keep their captured tariff
    pub fn reconfigure(&self, update: LotUpdate) -> Result<LotConfiguration, LotError> {
        let (result, held_us) = {
            let mut lot = self.lot.write();
            let started = Instant::now();
            (lot.reconfigure(update), elapsed_us(started))
        };
        self.metrics.record_operation(held_us);

        match &result {
            Ok(config) => info!(
                total_spots = %config.total_spots,
                occupied = %config.occupied_spots,
                tariffs = ?config.tariffs.names(),
                "lot_reconfigured"
            ),
            Err(e) => self.record_failure("reconfigure", e),
        }
        result
    }

    pub fn configuration(&self) -> LotConfiguration {
        self.lot.read().configuration()
    }

    /// (occupied spots, total spots) read under one lock
    pub fn occupancy(&self) -> (usize, u32) {
        let lot = self.lot.read();
        (lot.occupied_count(), lot.total_spots())
    }

    pub fn fees(&self) -> &FeeCalculator {
        &self.fees
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn record_failure(&self, operation: &'static str, error: &LotError) {
        if error.is_caller_error() {
            self.metrics.record_rejected();
        }
        warn!(operation = %operation, error = %error, "lot_operation_rejected");
    }
}

/// Lock hold time; lock acquisition wait is not included
fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}
