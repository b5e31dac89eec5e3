//! Parking fee calculation
//!
//! Pure function of (start, end, tariff, free minutes). Every started time
//! frame is billed in full; an elapsed time that lands exactly on a frame
//! boundary is not rounded up. Arithmetic is decimal, never binary float.

use crate::domain::error::LotError;
use crate::domain::types::{Fee, Tariff};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Compute the fee for a session from `start` to `end`.
///
/// Elapsed time is measured with millisecond resolution. Sessions up to and
/// including `free_minutes` cost nothing.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use parking_poc::services::fee::compute_fee;
/// use rust_decimal_macros::dec;
///
/// let start = Utc::now();
/// let fee = compute_fee(start, start + Duration::minutes(61), dec!(1), dec!(10), 15).unwrap();
/// assert_eq!(fee.to_string(), "20.00");
/// ```
pub fn compute_fee(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    time_frame_hours: Decimal,
    cost: Decimal,
    free_minutes: u32,
) -> Result<Fee, LotError> {
    if end < start {
        return Err(LotError::InvalidInterval { start, end });
    }

    let elapsed_ms = (end - start).num_milliseconds();
    if elapsed_ms <= i64::from(free_minutes) * MS_PER_MINUTE {
        return Ok(Fee::zero());
    }

    if time_frame_hours <= Decimal::ZERO {
        return Err(LotError::InvalidConfiguration(
            "tariff time frame must be positive".to_string(),
        ));
    }

    let frame_ms = time_frame_hours
        .checked_mul(Decimal::from(MS_PER_HOUR))
        .ok_or_else(|| overflow("time frame"))?;
    let units = Decimal::from(elapsed_ms)
        .checked_div(frame_ms)
        .ok_or_else(|| overflow("billing units"))?
        .ceil();
    let amount = units.checked_mul(cost).ok_or_else(|| overflow("fee"))?;

    Ok(Fee::from_amount(amount))
}

fn overflow(what: &str) -> LotError {
    LotError::InvalidConfiguration(format!("{what} out of range"))
}

/// Fee policy shared by every ticket in the lot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCalculator {
    free_minutes: u32,
}

impl FeeCalculator {
    pub fn new(free_minutes: u32) -> Self {
        Self { free_minutes }
    }

    #[inline]
    pub fn free_minutes(&self) -> u32 {
        self.free_minutes
    }

    /// Fee for a session billed under `rate`
    pub fn fee(
        &self,
        rate: &Tariff,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Fee, LotError> {
        compute_fee(start, end, rate.time_frame_hours, rate.cost, self.free_minutes)
    }
}
