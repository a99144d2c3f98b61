#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use volar_catalog::FixedClassifier;
use volar_core::{BookingRules, FixedClock, Notifier, NotifyError};
use volar_order::BookingContext;
use volar_shared::models::flight::FlightStatus;
use volar_shared::{
    Flight, Masked, Passenger, PassengerDetails, RouteCategory, SeatClass, SeatPlan, Ticket,
};
use volar_store::MemoryStore;

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub template: String,
    pub recipient: String,
    pub payload: Value,
}

/// Records every notification; can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, template: &str, recipient: &str, payload: Value) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("mail relay unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(SentNotification {
            template: template.to_string(),
            recipient: recipient.to_string(),
            payload,
        });
        Ok(())
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: BookingContext,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(start_time()));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = BookingContext::new(
            Arc::new(store.clone()),
            clock.clone(),
            Arc::new(FixedClassifier(RouteCategory::Domestic)),
            notifier.clone(),
            BookingRules::default(),
        );
        Self {
            store,
            clock,
            notifier,
            ctx,
        }
    }

    /// Scheduled flight departing `departs_in` from now with the given cabin
    /// and fares of 100.00 (economy) and 400.00 (first).
    pub async fn flight(&self, departs_in: Duration, economy: u32, first: u32) -> Flight {
        let aircraft_id = Uuid::new_v4();
        let departure_at = self.clock_now() + departs_in;
        let flight = Flight {
            id: Uuid::new_v4(),
            flight_number: "VL204".to_string(),
            aircraft_id,
            origin: "Madrid".to_string(),
            destination: "Sevilla".to_string(),
            departure_at,
            arrival_at: departure_at + Duration::hours(1),
            status: FlightStatus::Scheduled,
        };
        self.store.insert_flight(flight.clone()).await;
        self.store
            .insert_seat_plan(
                SeatPlan::new(aircraft_id, RouteCategory::Domestic)
                    .with_class(SeatClass::Economy, economy)
                    .with_class(SeatClass::First, first),
            )
            .await;
        self.store.set_fare(flight.id, SeatClass::Economy, 10_000).await;
        self.store.set_fare(flight.id, SeatClass::First, 40_000).await;
        flight
    }

    pub async fn user(&self, balance_cents: i64) -> Uuid {
        let user_id = Uuid::new_v4();
        self.store.set_balance(user_id, balance_cents).await;
        user_id
    }

    /// Insert `count` paid tickets on the first free seats of `class`.
    pub async fn sell(&self, flight: &Flight, class: SeatClass, count: usize) -> Vec<Ticket> {
        let taken: Vec<String> = self
            .store
            .tickets()
            .await
            .into_iter()
            .filter(|t| t.flight_id == flight.id)
            .map(|t| t.seat_code)
            .collect();
        let codes = self.seat_codes(flight, class).await;
        let mut sold = Vec::new();
        for code in codes.into_iter().filter(|c| !taken.contains(c)).take(count) {
            let ticket = Ticket::new_paid(
                Uuid::new_v4(),
                Uuid::new_v4(),
                flight.id,
                class,
                code,
                10_000,
                self.clock_now(),
            );
            let pax = Passenger::from_details(ticket.id, &passenger("Seeded Traveler", "00000000T"));
            self.store.insert_ticket(ticket.clone(), pax).await;
            sold.push(ticket);
        }
        sold
    }

    pub async fn seat_codes(&self, flight: &Flight, class: SeatClass) -> Vec<String> {
        let map = volar_order::CheckinEngine::new(self.ctx.clone())
            .seat_map(flight.id)
            .await
            .unwrap();
        map.seats
            .into_iter()
            .filter(|s| s.seat_class == class)
            .map(|s| s.code)
            .collect()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use volar_core::Clock;
        self.clock.now()
    }
}

pub fn passenger(name: &str, dni: &str) -> PassengerDetails {
    PassengerDetails {
        full_name: name.to_string(),
        dni: Masked(dni.to_string()),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: None,
        birth_date: None,
        gender: None,
    }
}
