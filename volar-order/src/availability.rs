//! Remaining capacity for a flight+class.
//!
//! `available = capacity - (paid tickets + unexpired holds)`, floored at 0.
//! A value read outside a write transaction is advisory only. Every write
//! that depends on it recomputes it inside its own transaction after
//! `lock_inventory`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use volar_core::{BookingTx, CoreResult};
use volar_shared::SeatClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub capacity: u32,
    pub paid: u32,
    pub held: u32,
    pub available: u32,
}

impl Availability {
    pub fn new(capacity: u32, paid: u32, held: u32) -> Self {
        Self {
            capacity,
            paid,
            held,
            available: capacity.saturating_sub(paid.saturating_add(held)),
        }
    }

    pub fn occupied(&self) -> u32 {
        self.paid.saturating_add(self.held)
    }

    /// Whether `quantity` more seats fit without overselling
    pub fn admits(&self, quantity: u32) -> bool {
        self.occupied().saturating_add(quantity) <= self.capacity
    }
}

pub async fn compute(
    tx: &mut dyn BookingTx,
    flight_id: Uuid,
    seat_class: SeatClass,
    capacity: u32,
    now: DateTime<Utc>,
    excluding_hold: Option<Uuid>,
) -> CoreResult<Availability> {
    let paid = tx.count_paid_tickets(flight_id, seat_class).await?;
    let held = tx
        .sum_active_holds(flight_id, seat_class, now, excluding_hold)
        .await?;

    Ok(Availability::new(capacity, paid, held))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floors_at_zero() {
        let a = Availability::new(10, 8, 5);
        assert_eq!(a.available, 0);
        assert_eq!(a.occupied(), 13);
        assert!(!a.admits(0));
    }

    #[test]
    fn test_admits_up_to_capacity() {
        let a = Availability::new(10, 8, 0);
        assert_eq!(a.available, 2);
        assert!(a.admits(2));
        assert!(!a.admits(3));
    }
}
