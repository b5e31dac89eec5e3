//! Single-threaded lot state machine
//!
//! Owns spot allocation and the ticket lifecycle. Free spots are kept in an
//! explicit ordered set so the lowest free ID is handed out first.
//!
//! Invariants (checked by `assert_invariants` in tests):
//! - free ∪ occupied = 1..=total_spots
//! - free ∩ occupied = ∅
//! - every ticket's `spot` equals its occupancy key

use crate::domain::error::{LotError, MAX_PAGE_LIMIT};
use crate::domain::ticket::Ticket;
use crate::domain::types::{SpotId, TariffTable};
use crate::services::fee::FeeCalculator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PAGE_START: i64 = 1;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Upper bound on lot size; the free set holds one entry per spot
pub const MAX_TOTAL_SPOTS: u32 = 1_000_000;

/// Requested change to lot-wide settings; absent fields stay as they are
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LotUpdate {
    #[serde(default)]
    pub total_spots: Option<u32>,
    #[serde(default)]
    pub tariffs: Option<TariffTable>,
}

/// Lot-wide settings plus current occupancy counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotConfiguration {
    pub total_spots: u32,
    pub occupied_spots: usize,
    pub free_spots: usize,
    pub tariffs: TariffTable,
}

#[derive(Debug, Clone)]
pub struct Lot {
    total_spots: u32,
    tariffs: TariffTable,
    occupied: BTreeMap<SpotId, Ticket>,
    free: BTreeSet<SpotId>,
}

impl Lot {
    pub fn new(total_spots: u32, tariffs: TariffTable) -> Result<Self, LotError> {
        validate_total_spots(total_spots)?;
        tariffs.validate()?;
        Ok(Self {
            total_spots,
            tariffs,
            occupied: BTreeMap::new(),
            free: (1..=total_spots).map(SpotId).collect(),
        })
    }

    pub fn total_spots(&self) -> u32 {
        self.total_spots
    }

    pub fn tariffs(&self) -> &TariffTable {
        &self.tariffs
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Open ticket parked at `spot`, if any
    pub fn ticket(&self, spot: SpotId) -> Option<&Ticket> {
        self.occupied.get(&spot)
    }

    /// Park a car on the lowest free spot.
    ///
    /// The tariff rule in force right now is copied onto the ticket.
    pub fn check_in(
        &mut self,
        car: &str,
        tariff: &str,
        now: DateTime<Utc>,
    ) -> Result<Ticket, LotError> {
        let rate = *self.tariffs.get(tariff).ok_or_else(|| LotError::UnknownTariff {
            tariff: tariff.to_string(),
            available: self.tariffs.names(),
        })?;

        let spot = self.free.pop_first().ok_or(LotError::LotFull)?;
        let ticket = Ticket::new(car, tariff, spot, rate, now);
        self.occupied.insert(spot, ticket.clone());
        Ok(ticket)
    }

    /// Close the ticket at `spot` and free the spot.
    ///
    /// The fee is computed before anything is removed, so a failed fee
    /// calculation leaves the car parked.
    pub fn check_out(
        &mut self,
        spot: SpotId,
        now: DateTime<Utc>,
        fees: &FeeCalculator,
    ) -> Result<Ticket, LotError> {
        let fee = match self.occupied.get(&spot) {
            Some(ticket) => fees.fee(&ticket.rate, ticket.start, now)?,
            None => return Err(LotError::LocationEmpty { spot }),
        };

        let mut ticket = self.occupied.remove(&spot).ok_or(LotError::LocationEmpty { spot })?;
        ticket.close(now, fee);
        self.free.insert(spot);
        Ok(ticket)
    }

    /// Open tickets for spots `start..=start + limit - 1`, ascending by spot
    pub fn list_occupied(&self, start: i64, limit: i64) -> Result<Vec<Ticket>, LotError> {
        if start < 1 || start > i64::from(self.total_spots) {
            return Err(LotError::PaginationStart { total_spots: self.total_spots });
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(LotError::PaginationLimit);
        }

        // start <= MAX_TOTAL_SPOTS and limit <= 100, both fit in u32
        let first = SpotId(start as u32);
        let last = SpotId((start + limit - 1) as u32);
        Ok(self.occupied.range(first..=last).map(|(_, ticket)| ticket.clone()).collect())
    }

    /// Apply new lot-wide settings, all or nothing.
    ///
    /// Shrinking below an occupied spot is rejected; open tickets keep the
    /// tariff captured at check-in.
    pub fn reconfigure(&mut self, update: LotUpdate) -> Result<LotConfiguration, LotError> {
        let LotUpdate { total_spots, tariffs } = update;

        if let Some(requested) = total_spots {
            validate_total_spots(requested)?;
            if let Some((&highest_occupied, _)) = self.occupied.last_key_value() {
                if highest_occupied.0 > requested {
                    return Err(LotError::ShrinkBelowOccupied { requested, highest_occupied });
                }
            }
        }
        if let Some(table) = &tariffs {
            table.validate()?;
        }

        if let Some(requested) = total_spots {
            self.resize(requested);
        }
        if let Some(table) = tariffs {
            self.tariffs = table;
        }
        Ok(self.configuration())
    }

    pub fn configuration(&self) -> LotConfiguration {
        LotConfiguration {
            total_spots: self.total_spots,
            occupied_spots: self.occupied.len(),
            free_spots: self.free.len(),
            tariffs: self.tariffs.clone(),
        }
    }

    fn resize(&mut self, total_spots: u32) {
        if total_spots > self.total_spots {
            self.free.extend((self.total_spots + 1..=total_spots).map(SpotId));
        } else {
            // Spots above the new total are all free (checked by the caller)
            self.free.retain(|spot| spot.0 <= total_spots);
        }
        self.total_spots = total_spots;
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let all: BTreeSet<SpotId> = (1..=self.total_spots).map(SpotId).collect();
        let occupied: BTreeSet<SpotId> = self.occupied.keys().copied().collect();

        assert!(self.free.is_disjoint(&occupied), "spot both free and occupied");
        let union: BTreeSet<SpotId> = self.free.union(&occupied).copied().collect();
        assert_eq!(union, all, "free and occupied do not cover the lot");
        for (spot, ticket) in &self.occupied {
            assert_eq!(*spot, ticket.spot, "ticket filed under the wrong spot");
            assert!(!ticket.is_closed(), "closed ticket still parked");
        }
    }
}

fn validate_total_spots(total_spots: u32) -> Result<(), LotError> {
    if total_spots == 0 || total_spots > MAX_TOTAL_SPOTS {
        return Err(LotError::InvalidConfiguration(format!(
            "total_spots must be between 1 and {MAX_TOTAL_SPOTS}"
        )));
    }
    Ok(())
}
