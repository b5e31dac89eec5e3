//! Ticket model - one parking session from check-in to check-out

use crate::domain::types::{Fee, SpotId, Tariff};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A parking session bound to one spot
///
/// The tariff rule is captured when the ticket is issued, so reconfiguring
/// the lot never changes what an open ticket will be billed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,           // UUIDv7, sortable by issue time
    pub car: String,        // license plate
    pub tariff: String,     // lower-cased tariff name
    pub spot: SpotId,
    pub rate: Tariff,       // billing rule at check-in
    pub start: DateTime<Utc>,
    pub finish: Option<DateTime<Utc>>,
    pub fee: Option<Fee>,
}

impl Ticket {
    /// Issue a new open ticket.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::Utc;
    /// use parking_poc::domain::{SpotId, Tariff, Ticket};
    /// use rust_decimal_macros::dec;
    ///
    /// let ticket = Ticket::new("ABC-123", "Hourly", SpotId(1), Tariff::new(dec!(1), dec!(10)), Utc::now());
    /// assert_eq!(ticket.tariff, "hourly");
    /// assert!(!ticket.is_closed());
    /// ```
    pub fn new(car: &str, tariff: &str, spot: SpotId, rate: Tariff, start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            car: car.to_string(),
            tariff: tariff.to_lowercase(),
            spot,
            rate,
            start,
            finish: None,
            fee: None,
        }
    }

    /// Cost of one billing unit captured at check-in
    pub fn base_cost(&self) -> Decimal {
        self.rate.cost
    }

    pub fn is_closed(&self) -> bool {
        self.finish.is_some()
    }

    /// Total time parked, once closed
    pub fn parked_duration(&self) -> Option<Duration> {
        self.finish.map(|finish| finish - self.start)
    }

    /// Record check-out. Finish and fee are written once.
    pub(crate) fn close(&mut self, finish: DateTime<Utc>, fee: Fee) {
        debug_assert!(!self.is_closed(), "ticket {} closed twice", self.id);
        self.finish = Some(finish);
        self.fee = Some(fee);
    }

    /// Render for display with the configured strftime pattern
    pub fn to_record(&self, date_time_format: &str) -> TicketRecord {
        TicketRecord {
            ticket_id: self.id.to_string(),
            car: self.car.clone(),
            tariff: self.tariff.clone(),
            location: self.spot,
            start: self.start.format(date_time_format).to_string(),
            finish: self.finish.map(|t| t.format(date_time_format).to_string()),
            fee: self.fee,
            base_cost: self.base_cost(),
        }
    }
}

/// Display form of a ticket, as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketRecord {
    pub ticket_id: String,
    pub car: String,
    pub tariff: String,
    pub location: SpotId,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Fee>,
    pub base_cost: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn hourly() -> Tariff {
        Tariff::new(dec!(1), dec!(10))
    }

    #[test]
    fn test_new_ticket() {
        let ticket = Ticket::new("ABC-123", "hourly", SpotId(1), hourly(), noon());

        assert_eq!(ticket.car, "ABC-123");
        assert_eq!(ticket.tariff, "hourly");
        assert_eq!(ticket.spot, SpotId(1));
        assert_eq!(ticket.base_cost(), dec!(10));
        assert!(ticket.finish.is_none());
        assert!(ticket.fee.is_none());
    }

    #[test]
    fn test_ticket_ids_are_unique() {
        let a = Ticket::new("A", "hourly", SpotId(1), hourly(), noon());
        let b = Ticket::new("B", "hourly", SpotId(2), hourly(), noon());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_close_sets_finish_and_fee() {
        let mut ticket = Ticket::new("ABC-123", "hourly", SpotId(1), hourly(), noon());
        let finish = noon() + Duration::minutes(61);
        ticket.close(finish, Fee::from_amount(dec!(20)));

        assert!(ticket.is_closed());
        assert_eq!(ticket.finish, Some(finish));
        assert_eq!(ticket.parked_duration(), Some(Duration::minutes(61)));
    }

    #[test]
    fn test_record_open_ticket_omits_finish_and_fee() {
        let ticket = Ticket::new("ABC-123", "hourly", SpotId(3), hourly(), noon());
        let json = serde_json::to_value(ticket.to_record("%Y-%m-%d %H:%M:%S")).unwrap();

        assert_eq!(json["car"], "ABC-123");
        assert_eq!(json["location"], 3);
        assert_eq!(json["start"], "2024-03-01 12:00:00");
        assert_eq!(json["base_cost"], "10");
        assert!(json.get("finish").is_none());
        assert!(json.get("fee").is_none());
    }

    #[test]
    fn test_record_closed_ticket() {
        let mut ticket = Ticket::new("ABC-123", "hourly", SpotId(3), hourly(), noon());
        ticket.close(noon() + Duration::minutes(16), Fee::from_amount(dec!(10)));
        let record = ticket.to_record("%d/%m/%Y %H:%M");

        assert_eq!(record.start, "01/03/2024 12:00");
        assert_eq!(record.finish.as_deref(), Some("01/03/2024 12:16"));
        assert_eq!(record.fee.map(|f| f.to_string()).as_deref(), Some("10.00"));
    }
}
