//! In-memory booking store.
//!
//! A transaction locks the whole state, works on a copy and swaps it back
//! on commit. Transactions are therefore fully serialized and a dropped
//! transaction leaves the state untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use volar_core::{BookingStore, BookingTx, CoreError, CoreResult};
use volar_shared::{
    Cart, CartHold, Flight, Passenger, RouteCategory, SeatClass, SeatPlan, Ticket, TicketStatus,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    flights: HashMap<Uuid, Flight>,
    seat_plans: HashMap<(Uuid, RouteCategory), SeatPlan>,
    fares: HashMap<(Uuid, SeatClass), i64>,
    balances: HashMap<Uuid, i64>,
    carts: HashMap<Uuid, Cart>,
    holds: HashMap<Uuid, CartHold>,
    tickets: Vec<Ticket>,
    passengers: HashMap<Uuid, Passenger>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
    lock_log: Arc<Mutex<Vec<Uuid>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding

    pub async fn insert_flight(&self, flight: Flight) {
        self.state.lock().await.flights.insert(flight.id, flight);
    }

    pub async fn insert_seat_plan(&self, plan: SeatPlan) {
        self.state
            .lock()
            .await
            .seat_plans
            .insert((plan.aircraft_id, plan.category), plan);
    }

    pub async fn set_fare(&self, flight_id: Uuid, seat_class: SeatClass, amount_cents: i64) {
        self.state
            .lock()
            .await
            .fares
            .insert((flight_id, seat_class), amount_cents);
    }

    pub async fn set_balance(&self, user_id: Uuid, balance_cents: i64) {
        self.state.lock().await.balances.insert(user_id, balance_cents);
    }

    pub async fn insert_ticket(&self, ticket: Ticket, passenger: Passenger) {
        let mut state = self.state.lock().await;
        state.passengers.insert(ticket.id, passenger);
        state.tickets.push(ticket);
    }

    /// Make the next `commit()` fail as an unexpected store error would.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    // Inspection

    pub async fn balance(&self, user_id: Uuid) -> Option<i64> {
        self.state.lock().await.balances.get(&user_id).copied()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().await.tickets.clone()
    }

    pub async fn holds(&self) -> Vec<CartHold> {
        let mut holds: Vec<CartHold> = self.state.lock().await.holds.values().cloned().collect();
        holds.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        holds
    }

    pub async fn passenger_count(&self) -> usize {
        self.state.lock().await.passengers.len()
    }

    /// Flights passed to `lock_inventory`, in call order across all transactions
    pub async fn locked_flights(&self) -> Vec<Uuid> {
        self.lock_log.lock().await.clone()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> CoreResult<Box<dyn BookingTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            fail_commit: self.fail_next_commit.clone(),
            lock_log: self.lock_log.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    fail_commit: Arc<AtomicBool>,
    lock_log: Arc<Mutex<Vec<Uuid>>>,
}

impl MemoryTx {
    fn passenger_for(&self, ticket_id: Uuid) -> CoreResult<Passenger> {
        self.work
            .passengers
            .get(&ticket_id)
            .cloned()
            .ok_or_else(|| CoreError::Store(format!("ticket {} has no passenger", ticket_id)))
    }
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn flight(&mut self, flight_id: Uuid) -> CoreResult<Option<Flight>> {
        Ok(self.work.flights.get(&flight_id).cloned())
    }

    async fn lock_inventory(&mut self, flight_id: Uuid) -> CoreResult<()> {
        // The whole state is already locked for the lifetime of the transaction.
        self.lock_log.lock().await.push(flight_id);
        Ok(())
    }

    async fn seat_plan(
        &mut self,
        aircraft_id: Uuid,
        category: RouteCategory,
    ) -> CoreResult<Option<SeatPlan>> {
        Ok(self.work.seat_plans.get(&(aircraft_id, category)).cloned())
    }

    async fn fare(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<Option<i64>> {
        Ok(self.work.fares.get(&(flight_id, seat_class)).copied())
    }

    async fn balance(&mut self, user_id: Uuid) -> CoreResult<Option<i64>> {
        Ok(self.work.balances.get(&user_id).copied())
    }

    async fn debit_balance(&mut self, user_id: Uuid, amount_cents: i64) -> CoreResult<bool> {
        match self.work.balances.get_mut(&user_id) {
            Some(balance) if *balance >= amount_cents => {
                *balance -= amount_cents;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cart_for_user(&mut self, user_id: Uuid) -> CoreResult<Option<Cart>> {
        Ok(self
            .work
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> CoreResult<()> {
        if !self.work.carts.values().any(|c| c.user_id == cart.user_id) {
            self.work.carts.insert(cart.id, cart.clone());
        }
        Ok(())
    }

    async fn holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<Vec<CartHold>> {
        let mut holds: Vec<CartHold> = self
            .work
            .holds
            .values()
            .filter(|h| h.cart_id == cart_id)
            .cloned()
            .collect();
        holds.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(holds)
    }

    async fn hold(&mut self, hold_id: Uuid) -> CoreResult<Option<CartHold>> {
        Ok(self.work.holds.get(&hold_id).cloned())
    }

    async fn insert_hold(&mut self, hold: &CartHold) -> CoreResult<()> {
        if !self.work.carts.contains_key(&hold.cart_id) {
            return Err(CoreError::Store(format!("cart {} does not exist", hold.cart_id)));
        }
        self.work.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn update_hold(&mut self, hold: &CartHold) -> CoreResult<()> {
        if let Some(existing) = self.work.holds.get_mut(&hold.id) {
            existing.quantity = hold.quantity;
            existing.expires_at = hold.expires_at;
        }
        Ok(())
    }

    async fn delete_hold(&mut self, hold_id: Uuid) -> CoreResult<bool> {
        Ok(self.work.holds.remove(&hold_id).is_some())
    }

    async fn delete_holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<u64> {
        let before = self.work.holds.len();
        self.work.holds.retain(|_, h| h.cart_id != cart_id);
        Ok((before - self.work.holds.len()) as u64)
    }

    async fn delete_expired_holds(
        &mut self,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        let before = self.work.holds.len();
        self.work.holds.retain(|_, h| {
            let in_scope = cart_id.map_or(true, |c| h.cart_id == c);
            !(in_scope && !h.is_active(now))
        });
        Ok((before - self.work.holds.len()) as u64)
    }

    async fn count_paid_tickets(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<u32> {
        Ok(self
            .work
            .tickets
            .iter()
            .filter(|t| t.flight_id == flight_id && t.seat_class == seat_class)
            .filter(|t| t.status == TicketStatus::Paid)
            .count() as u32)
    }

    async fn sum_active_holds(
        &mut self,
        flight_id: Uuid,
        seat_class: SeatClass,
        now: DateTime<Utc>,
        excluding: Option<Uuid>,
    ) -> CoreResult<u32> {
        Ok(self
            .work
            .holds
            .values()
            .filter(|h| h.flight_id == flight_id && h.seat_class == seat_class)
            .filter(|h| h.is_active(now))
            .filter(|h| Some(h.id) != excluding)
            .map(|h| h.quantity)
            .sum())
    }

    async fn tickets_for_flight(&mut self, flight_id: Uuid) -> CoreResult<Vec<Ticket>> {
        Ok(self
            .work
            .tickets
            .iter()
            .filter(|t| t.flight_id == flight_id)
            .cloned()
            .collect())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket, passenger: &Passenger) -> CoreResult<()> {
        if self.work.tickets.iter().any(|t| t.id == ticket.id) {
            return Err(CoreError::Store(format!("duplicate ticket id {}", ticket.id)));
        }
        self.work.passengers.insert(ticket.id, passenger.clone());
        self.work.tickets.push(ticket.clone());
        Ok(())
    }

    async fn ticket(&mut self, ticket_id: Uuid) -> CoreResult<Option<Ticket>> {
        Ok(self.work.tickets.iter().find(|t| t.id == ticket_id).cloned())
    }

    async fn passenger(&mut self, ticket_id: Uuid) -> CoreResult<Option<Passenger>> {
        Ok(self.work.passengers.get(&ticket_id).cloned())
    }

    async fn tickets_by_purchase(&mut self, purchase_id: Uuid) -> CoreResult<Vec<Ticket>> {
        Ok(self
            .work
            .tickets
            .iter()
            .filter(|t| t.purchase_id == purchase_id)
            .cloned()
            .collect())
    }

    async fn tickets_by_checkin_code(&mut self, code: &str) -> CoreResult<Vec<(Ticket, Passenger)>> {
        let tickets: Vec<Ticket> = self
            .work
            .tickets
            .iter()
            .filter(|t| t.checkin_code.as_deref() == Some(code))
            .cloned()
            .collect();

        tickets
            .into_iter()
            .map(|t| {
                let passenger = self.passenger_for(t.id)?;
                Ok((t, passenger))
            })
            .collect()
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> CoreResult<()> {
        match self.work.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(existing) => {
                *existing = ticket.clone();
                Ok(())
            }
            None => Err(CoreError::Store(format!("ticket {} does not exist", ticket.id))),
        }
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Store("injected commit failure".to_string()));
        }
        let MemoryTx { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }
}
