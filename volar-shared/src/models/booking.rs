use crate::models::flight::SeatClass;
use crate::pii::Masked;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// One cart per user, created lazily on first use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
        }
    }
}

/// A temporary, expiring claim on `quantity` seats of a flight+class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartHold {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub quantity: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CartHold {
    /// A hold counts against availability only while its expiry lies in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Ticket status. Cancellation is a status change, tickets are never deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Paid,
    Cancelled,
    Used,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Paid => "paid",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Used => "used",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(TicketStatus::Paid),
            "cancelled" => Ok(TicketStatus::Cancelled),
            "used" => Ok(TicketStatus::Used),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

/// Persisted check-in progress of a ticket.
///
/// `Validated` is not stored: it is the transient outcome of a successful
/// code + DNI validation and never outlives the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckinState {
    Booked,
    CodeIssued,
    SeatChosen,
    CheckedIn,
}

/// A permanent, priced, seated ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,
    /// Groups every ticket created by one checkout or issuance
    pub purchase_id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub seat_code: String,
    pub price_cents: i64,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub checkin_code: Option<String>,
    pub assigned_seat: Option<String>,
    pub checkin_completed: bool,
    pub checkin_completed_at: Option<DateTime<Utc>>,
    pub boarding_pass: Option<String>,
}

impl Ticket {
    pub fn new_paid(
        purchase_id: Uuid,
        user_id: Uuid,
        flight_id: Uuid,
        seat_class: SeatClass,
        seat_code: String,
        price_cents: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            purchase_id,
            user_id,
            flight_id,
            seat_class,
            seat_code,
            price_cents,
            status: TicketStatus::Paid,
            created_at: now,
            checkin_code: None,
            assigned_seat: None,
            checkin_completed: false,
            checkin_completed_at: None,
            boarding_pass: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == TicketStatus::Paid
    }

    /// Seat the passenger will actually sit in
    pub fn current_seat(&self) -> &str {
        self.assigned_seat.as_deref().unwrap_or(&self.seat_code)
    }

    pub fn checkin_state(&self) -> CheckinState {
        if self.checkin_completed {
            CheckinState::CheckedIn
        } else if self.assigned_seat.is_some() {
            CheckinState::SeatChosen
        } else if self.checkin_code.is_some() {
            CheckinState::CodeIssued
        } else {
            CheckinState::Booked
        }
    }
}

/// Traveler data supplied at checkout, one record per requested ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub full_name: String,
    pub dni: Masked<String>,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// The traveler owning exactly one ticket, created atomically with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub full_name: String,
    pub dni: Masked<String>,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
}

impl Passenger {
    pub fn from_details(ticket_id: Uuid, details: &PassengerDetails) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            full_name: details.full_name.trim().to_string(),
            dni: Masked(details.dni.0.trim().to_uppercase()),
            email: details.email.trim().to_string(),
            phone: details.phone.clone(),
            birth_date: details.birth_date,
            gender: details.gender.clone(),
        }
    }

    /// Document numbers compare case-insensitively, ignoring surrounding whitespace.
    pub fn dni_matches(&self, dni: &str) -> bool {
        self.dni.0.eq_ignore_ascii_case(dni.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket::new_paid(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            SeatClass::Economy,
            "C1".to_string(),
            12000,
            Utc::now(),
        )
    }

    #[test]
    fn test_checkin_state_progression() {
        let mut t = ticket();
        assert_eq!(t.checkin_state(), CheckinState::Booked);

        t.checkin_code = Some("AB12CD34".to_string());
        assert_eq!(t.checkin_state(), CheckinState::CodeIssued);

        t.assigned_seat = Some("D1".to_string());
        assert_eq!(t.checkin_state(), CheckinState::SeatChosen);
        assert_eq!(t.current_seat(), "D1");
        assert_eq!(t.seat_code, "C1");

        t.checkin_completed = true;
        assert_eq!(t.checkin_state(), CheckinState::CheckedIn);
    }

    #[test]
    fn test_hold_expiry() {
        let now = Utc::now();
        let hold = CartHold {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            seat_class: SeatClass::Economy,
            quantity: 2,
            expires_at: now + chrono::Duration::seconds(90),
            created_at: now,
        };
        assert!(hold.is_active(now));
        assert_eq!(hold.seconds_to_expiry(now), 90);
        assert!(!hold.is_active(now + chrono::Duration::seconds(90)));
        assert_eq!(hold.seconds_to_expiry(now + chrono::Duration::hours(1)), 0);
    }

    #[test]
    fn test_passenger_normalizes_dni() {
        let details = PassengerDetails {
            full_name: " Ana Ruiz ".to_string(),
            dni: Masked(" 12345678z ".to_string()),
            email: "ana@example.com".to_string(),
            phone: None,
            birth_date: None,
            gender: None,
        };
        let pax = Passenger::from_details(Uuid::new_v4(), &details);
        assert_eq!(pax.full_name, "Ana Ruiz");
        assert_eq!(pax.dni.0, "12345678Z");
        assert!(pax.dni_matches("12345678z"));
        assert_eq!(format!("{:?}", pax.dni), "********");
    }
}
