//! Shared types for the parking engine

use crate::domain::error::LotError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Scale used for every fee amount ("10.00")
pub const FEE_SCALE: u32 = 2;

/// Newtype wrapper for spot IDs to provide type safety
///
/// Spots are numbered from 1 up to the lot's total spot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct SpotId(pub u32);

impl std::fmt::Display for SpotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Billing rule for a single tariff: every started time frame costs `cost`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    /// Length of one billing unit in hours (may be fractional, e.g. 0.5)
    pub time_frame_hours: Decimal,
    /// Price of one billing unit
    pub cost: Decimal,
}

impl Tariff {
    pub fn new(time_frame_hours: Decimal, cost: Decimal) -> Self {
        Self { time_frame_hours, cost }
    }

    /// Reject tariffs that would make fee calculation meaningless
    pub fn validate(&self, name: &str) -> Result<(), LotError> {
        if self.time_frame_hours <= Decimal::ZERO {
            return Err(LotError::InvalidConfiguration(format!(
                "tariff '{name}' must have a positive time frame"
            )));
        }
        if self.cost < Decimal::ZERO {
            return Err(LotError::InvalidConfiguration(format!(
                "tariff '{name}' must not have a negative cost"
            )));
        }
        if self.cost.normalize().scale() > FEE_SCALE {
            return Err(LotError::InvalidConfiguration(format!(
                "tariff '{name}' cost must have at most {FEE_SCALE} decimal places"
            )));
        }
        Ok(())
    }
}

/// Tariff name to billing rule mapping
///
/// Names are case-insensitive: they are stored lower-cased and every lookup
/// lower-cases its key. Iteration order is alphabetical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TariffTable(BTreeMap<String, Tariff>);

impl TariffTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tariff, returning the previous rule for that name
    pub fn insert(&mut self, name: &str, tariff: Tariff) -> Option<Tariff> {
        self.0.insert(name.to_lowercase(), tariff)
    }

    pub fn get(&self, name: &str) -> Option<&Tariff> {
        self.0.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Tariff names in alphabetical order
    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tariff)> {
        self.0.iter().map(|(name, tariff)| (name.as_str(), tariff))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A usable table has at least one tariff and every tariff is valid
    pub fn validate(&self) -> Result<(), LotError> {
        if self.is_empty() {
            return Err(LotError::InvalidConfiguration(
                "at least one tariff must be configured".to_string(),
            ));
        }
        for (name, tariff) in self.iter() {
            tariff.validate(name)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Tariff)> for TariffTable {
    fn from_iter<I: IntoIterator<Item = (String, Tariff)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, tariff) in iter {
            table.insert(&name, tariff);
        }
        table
    }
}

impl<'de> Deserialize<'de> for TariffTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Tariff>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

/// Fixed-point parking fee, always carried with two decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Fee(Decimal);

impl Fee {
    pub fn from_amount(amount: Decimal) -> Self {
        let mut amount = amount;
        amount.rescale(FEE_SCALE);
        Self(amount)
    }

    pub fn zero() -> Self {
        Self::from_amount(Decimal::ZERO)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Amount in hundredths, saturating at `u64::MAX`
    pub fn cents(&self) -> u64 {
        (self.0 * Decimal::ONE_HUNDRED).trunc().to_u64().unwrap_or(u64::MAX)
    }
}

impl std::fmt::Display for Fee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
