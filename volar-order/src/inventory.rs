use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use volar_catalog::{seatmap, RouteClassifier, SeatLayout};
use volar_core::{BookingTx, CoreError, CoreResult};
use volar_shared::{Flight, RouteCategory, SeatClass, SeatPlan, Ticket};

/// A flight together with the seat plan that applies to its route
#[derive(Debug, Clone)]
pub struct FlightInventory {
    pub flight: Flight,
    pub category: RouteCategory,
    pub plan: SeatPlan,
}

impl FlightInventory {
    pub async fn load(
        tx: &mut dyn BookingTx,
        classifier: &dyn RouteClassifier,
        flight_id: Uuid,
    ) -> CoreResult<Self> {
        let flight = tx
            .flight(flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", flight_id)))?;
        let category = classifier.classify_flight(&flight);
        // An aircraft without rows for this category has no configured classes.
        let plan = tx
            .seat_plan(flight.aircraft_id, category)
            .await?
            .unwrap_or_else(|| SeatPlan::new(flight.aircraft_id, category));

        Ok(Self {
            flight,
            category,
            plan,
        })
    }

    pub fn capacity(&self, seat_class: SeatClass) -> CoreResult<u32> {
        self.plan
            .capacity(seat_class)
            .ok_or(CoreError::ClassNotConfigured(seat_class))
    }

    pub fn seat_codes(&self, seat_class: SeatClass) -> CoreResult<Vec<String>> {
        seatmap::generate(&self.plan.seats, seat_class)
    }

    pub fn layout(&self) -> SeatLayout {
        SeatLayout::from_plan(&self.plan)
    }

    pub fn ensure_sellable(&self, now: chrono::DateTime<chrono::Utc>) -> CoreResult<()> {
        if self.flight.is_sellable(now) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "flight {} is not open for sale",
                self.flight.flight_number
            )))
        }
    }
}

/// Per-transaction cache so each flight's plan is resolved once
#[derive(Debug, Default)]
pub struct InventoryCache {
    flights: HashMap<Uuid, FlightInventory>,
}

impl InventoryCache {
    pub async fn get(
        &mut self,
        tx: &mut dyn BookingTx,
        classifier: &dyn RouteClassifier,
        flight_id: Uuid,
    ) -> CoreResult<&FlightInventory> {
        if !self.flights.contains_key(&flight_id) {
            let inventory = FlightInventory::load(tx, classifier, flight_id).await?;
            self.flights.insert(flight_id, inventory);
        }
        self.flights
            .get(&flight_id)
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", flight_id)))
    }

    /// Already-loaded entry, without touching the store
    pub fn peek(&self, flight_id: Uuid) -> Option<&FlightInventory> {
        self.flights.get(&flight_id)
    }
}

/// Seat codes consumed by paid tickets. A ticket sits in exactly one seat:
/// its assigned seat once chosen, its purchased seat until then.
pub fn occupied_seats<'a, I>(tickets: I, excluding: Option<Uuid>) -> HashSet<String>
where
    I: IntoIterator<Item = &'a Ticket>,
{
    let mut occupied = HashSet::new();
    for ticket in tickets {
        if !ticket.is_paid() || Some(ticket.id) == excluding {
            continue;
        }
        occupied.insert(ticket.current_seat().to_string());
    }
    occupied
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use volar_shared::TicketStatus;

    fn ticket(seat: &str, assigned: Option<&str>, status: TicketStatus) -> Ticket {
        let mut t = Ticket::new_paid(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            SeatClass::Economy,
            seat.to_string(),
            100,
            Utc::now(),
        );
        t.assigned_seat = assigned.map(str::to_string);
        t.status = status;
        t
    }

    #[test]
    fn test_occupied_seats_follow_current_seat() {
        let moved = ticket("C1", Some("D1"), TicketStatus::Paid);
        let plain = ticket("E1", None, TicketStatus::Paid);
        let cancelled = ticket("F1", Some("A2"), TicketStatus::Cancelled);
        let tickets = vec![moved.clone(), plain, cancelled];

        let occupied = occupied_seats(&tickets, None);
        assert_eq!(occupied.len(), 2);
        assert!(occupied.contains("D1"));
        assert!(occupied.contains("E1"));
        // The purchased seat of a moved ticket is free again.
        assert!(!occupied.contains("C1"));
        assert!(!occupied.contains("F1"));
        assert!(!occupied.contains("A2"));

        let others = occupied_seats(&tickets, Some(moved.id));
        assert_eq!(others.len(), 1);
    }
}
