use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use volar_shared::{Cart, CartHold, Flight, Passenger, RouteCategory, SeatClass, SeatPlan, Ticket};

use crate::CoreResult;

/// Relational store with transaction support
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Open a transaction. Nothing is persisted until [`BookingTx::commit`];
    /// dropping the transaction rolls it back.
    async fn begin(&self) -> CoreResult<Box<dyn BookingTx>>;
}

/// One open transaction against the booking store
#[async_trait]
pub trait BookingTx: Send {
    // Catalog

    async fn flight(&mut self, flight_id: Uuid) -> CoreResult<Option<Flight>>;

    /// Serialize capacity-dependent writers of one flight until this transaction ends.
    async fn lock_inventory(&mut self, flight_id: Uuid) -> CoreResult<()>;

    async fn seat_plan(
        &mut self,
        aircraft_id: Uuid,
        category: RouteCategory,
    ) -> CoreResult<Option<SeatPlan>>;

    async fn fare(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<Option<i64>>;

    // Accounts

    async fn balance(&mut self, user_id: Uuid) -> CoreResult<Option<i64>>;

    /// Returns `false` without changing anything if the balance is below `amount_cents`.
    async fn debit_balance(&mut self, user_id: Uuid, amount_cents: i64) -> CoreResult<bool>;

    // Carts and holds

    async fn cart_for_user(&mut self, user_id: Uuid) -> CoreResult<Option<Cart>>;

    async fn insert_cart(&mut self, cart: &Cart) -> CoreResult<()>;

    async fn holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<Vec<CartHold>>;

    async fn hold(&mut self, hold_id: Uuid) -> CoreResult<Option<CartHold>>;

    async fn insert_hold(&mut self, hold: &CartHold) -> CoreResult<()>;

    async fn update_hold(&mut self, hold: &CartHold) -> CoreResult<()>;

    async fn delete_hold(&mut self, hold_id: Uuid) -> CoreResult<bool>;

    async fn delete_holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<u64>;

    /// Delete holds with `expires_at <= now`, in one cart or across all carts.
    async fn delete_expired_holds(
        &mut self,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<u64>;

    // Inventory

    async fn count_paid_tickets(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<u32>;

    /// Sum of quantities of unexpired holds, optionally leaving one hold out.
    async fn sum_active_holds(
        &mut self,
        flight_id: Uuid,
        seat_class: SeatClass,
        now: DateTime<Utc>,
        excluding: Option<Uuid>,
    ) -> CoreResult<u32>;

    async fn tickets_for_flight(&mut self, flight_id: Uuid) -> CoreResult<Vec<Ticket>>;

    // Tickets

    async fn insert_ticket(&mut self, ticket: &Ticket, passenger: &Passenger) -> CoreResult<()>;

    async fn ticket(&mut self, ticket_id: Uuid) -> CoreResult<Option<Ticket>>;

    async fn passenger(&mut self, ticket_id: Uuid) -> CoreResult<Option<Passenger>>;

    async fn tickets_by_purchase(&mut self, purchase_id: Uuid) -> CoreResult<Vec<Ticket>>;

    async fn tickets_by_checkin_code(&mut self, code: &str) -> CoreResult<Vec<(Ticket, Passenger)>>;

    async fn update_ticket(&mut self, ticket: &Ticket) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
}
