use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::flight::SeatClass;

pub const BOOKING_CONFIRMATION_TEMPLATE: &str = "booking_confirmation";
pub const CHECKIN_CONFIRMATION_TEMPLATE: &str = "checkin_confirmation";

/// Sent to each passenger once their ticket is committed
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingConfirmation {
    pub purchase_id: Uuid,
    pub ticket_id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub seat_class: SeatClass,
    pub seat_code: String,
    pub passenger_name: String,
    pub checkin_code: Option<String>,
}

/// Sent after a ticket reaches the checked-in state
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckinConfirmation {
    pub ticket_id: Uuid,
    pub flight_number: String,
    pub departure_at: DateTime<Utc>,
    pub seat_code: String,
    pub passenger_name: String,
    pub boarding_pass: String,
    pub completed_at: DateTime<Utc>,
}

/// Wire envelope for outbound notifications
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationEnvelope {
    pub template: String,
    pub recipient: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}
