//! Postgres-backed booking store.
//!
//! Every engine operation runs inside one `sqlx` transaction. Capacity
//! checks are re-read inside that transaction after `lock_inventory` takes
//! a `FOR UPDATE` lock on the flight row, so two writers for the same
//! flight queue on the row lock instead of both reading stale counts.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use uuid::Uuid;
use volar_core::{BookingStore, BookingTx, CoreError, CoreResult};
use volar_shared::{
    Cart, CartHold, Flight, FlightStatus, Masked, Passenger, RouteCategory, SeatClass, SeatPlan,
    Ticket, TicketStatus,
};

const TICKET_COLUMNS: &str = "\
    t.id, t.purchase_id, t.user_id, t.flight_id, t.seat_class, t.seat_code, t.price_cents, \
    t.status, t.created_at, t.checkin_code, t.assigned_seat, t.checkin_completed, \
    t.checkin_completed_at, t.boarding_pass";

const PASSENGER_COLUMNS: &str = "\
    p.id AS passenger_id, p.ticket_id, p.full_name, p.dni, p.email, p.phone, p.birth_date, p.gender";

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

fn parse<T: FromStr<Err = String>>(value: &str) -> CoreResult<T> {
    value.parse::<T>().map_err(CoreError::Store)
}

fn to_u32(value: i64, what: &str) -> CoreResult<u32> {
    u32::try_from(value).map_err(|_| CoreError::Store(format!("{} out of range: {}", what, value)))
}

fn to_i32(value: u32) -> CoreResult<i32> {
    i32::try_from(value).map_err(|_| CoreError::Validation(format!("value out of range: {}", value)))
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    aircraft_id: Uuid,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    arrival_at: DateTime<Utc>,
    status: String,
}

impl FlightRow {
    fn into_flight(self) -> CoreResult<Flight> {
        Ok(Flight {
            id: self.id,
            flight_number: self.flight_number,
            aircraft_id: self.aircraft_id,
            origin: self.origin,
            destination: self.destination,
            departure_at: self.departure_at,
            arrival_at: self.arrival_at,
            status: parse::<FlightStatus>(&self.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    cart_id: Uuid,
    flight_id: Uuid,
    seat_class: String,
    quantity: i32,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl HoldRow {
    fn into_hold(self) -> CoreResult<CartHold> {
        Ok(CartHold {
            id: self.id,
            cart_id: self.cart_id,
            flight_id: self.flight_id,
            seat_class: parse::<SeatClass>(&self.seat_class)?,
            quantity: to_u32(i64::from(self.quantity), "hold quantity")?,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    purchase_id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    seat_class: String,
    seat_code: String,
    price_cents: i64,
    status: String,
    created_at: DateTime<Utc>,
    checkin_code: Option<String>,
    assigned_seat: Option<String>,
    checkin_completed: bool,
    checkin_completed_at: Option<DateTime<Utc>>,
    boarding_pass: Option<String>,
}

impl TicketRow {
    fn into_ticket(self) -> CoreResult<Ticket> {
        Ok(Ticket {
            id: self.id,
            purchase_id: self.purchase_id,
            user_id: self.user_id,
            flight_id: self.flight_id,
            seat_class: parse::<SeatClass>(&self.seat_class)?,
            seat_code: self.seat_code,
            price_cents: self.price_cents,
            status: parse::<TicketStatus>(&self.status)?,
            created_at: self.created_at,
            checkin_code: self.checkin_code,
            assigned_seat: self.assigned_seat,
            checkin_completed: self.checkin_completed,
            checkin_completed_at: self.checkin_completed_at,
            boarding_pass: self.boarding_pass,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    passenger_id: Uuid,
    ticket_id: Uuid,
    full_name: String,
    dni: String,
    email: String,
    phone: Option<String>,
    birth_date: Option<NaiveDate>,
    gender: Option<String>,
}

impl PassengerRow {
    fn into_passenger(self) -> Passenger {
        Passenger {
            id: self.passenger_id,
            ticket_id: self.ticket_id,
            full_name: self.full_name,
            dni: Masked(self.dni),
            email: self.email,
            phone: self.phone,
            birth_date: self.birth_date,
            gender: self.gender,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketPassengerRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    #[sqlx(flatten)]
    passenger: PassengerRow,
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> CoreResult<Box<dyn BookingTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgBookingTx { tx }))
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn flight(&mut self, flight_id: Uuid) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            "SELECT id, flight_number, aircraft_id, origin, destination, departure_at, arrival_at, status \
             FROM flights WHERE id = $1",
        )
        .bind(flight_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(FlightRow::into_flight).transpose()
    }

    async fn lock_inventory(&mut self, flight_id: Uuid) -> CoreResult<()> {
        sqlx::query("SELECT id FROM flights WHERE id = $1 FOR UPDATE")
            .bind(flight_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn seat_plan(
        &mut self,
        aircraft_id: Uuid,
        category: RouteCategory,
    ) -> CoreResult<Option<SeatPlan>> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            "SELECT seat_class, seat_count FROM seat_class_configs \
             WHERE aircraft_id = $1 AND route_category = $2",
        )
        .bind(aircraft_id)
        .bind(category.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut plan = SeatPlan::new(aircraft_id, category);
        for (class, count) in rows {
            plan.seats
                .insert(parse::<SeatClass>(&class)?, to_u32(i64::from(count), "seat count")?);
        }
        Ok(Some(plan))
    }

    async fn fare(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<Option<i64>> {
        sqlx::query_scalar("SELECT amount_cents FROM fares WHERE flight_id = $1 AND seat_class = $2")
            .bind(flight_id)
            .bind(seat_class.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)
    }

    async fn balance(&mut self, user_id: Uuid) -> CoreResult<Option<i64>> {
        sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)
    }

    async fn debit_balance(&mut self, user_id: Uuid, amount_cents: i64) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents - $2 \
             WHERE user_id = $1 AND balance_cents >= $2",
        )
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn cart_for_user(&mut self, user_id: Uuid) -> CoreResult<Option<Cart>> {
        let row: Option<(Uuid, Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, user_id, created_at FROM carts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_err)?;

        Ok(row.map(|(id, user_id, created_at)| Cart {
            id,
            user_id,
            created_at,
        }))
    }

    async fn insert_cart(&mut self, cart: &Cart) -> CoreResult<()> {
        // A concurrent first request may have created the cart already.
        sqlx::query(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(cart.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<Vec<CartHold>> {
        let rows: Vec<HoldRow> = sqlx::query_as(
            "SELECT id, cart_id, flight_id, seat_class, quantity, expires_at, created_at \
             FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id",
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(HoldRow::into_hold).collect()
    }

    async fn hold(&mut self, hold_id: Uuid) -> CoreResult<Option<CartHold>> {
        let row: Option<HoldRow> = sqlx::query_as(
            "SELECT id, cart_id, flight_id, seat_class, quantity, expires_at, created_at \
             FROM cart_items WHERE id = $1",
        )
        .bind(hold_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(HoldRow::into_hold).transpose()
    }

    async fn insert_hold(&mut self, hold: &CartHold) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, flight_id, seat_class, quantity, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(hold.id)
        .bind(hold.cart_id)
        .bind(hold.flight_id)
        .bind(hold.seat_class.as_str())
        .bind(to_i32(hold.quantity)?)
        .bind(hold.expires_at)
        .bind(hold.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_hold(&mut self, hold: &CartHold) -> CoreResult<()> {
        sqlx::query("UPDATE cart_items SET quantity = $2, expires_at = $3 WHERE id = $1")
            .bind(hold.id)
            .bind(to_i32(hold.quantity)?)
            .bind(hold.expires_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_hold(&mut self, hold_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(hold_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_holds_for_cart(&mut self, cart_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_holds(
        &mut self,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM cart_items WHERE expires_at <= $1 AND ($2::uuid IS NULL OR cart_id = $2)",
        )
        .bind(now)
        .bind(cart_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn count_paid_tickets(&mut self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE flight_id = $1 AND seat_class = $2 AND status = 'paid'",
        )
        .bind(flight_id)
        .bind(seat_class.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        to_u32(count, "ticket count")
    }

    async fn sum_active_holds(
        &mut self,
        flight_id: Uuid,
        seat_class: SeatClass,
        now: DateTime<Utc>,
        excluding: Option<Uuid>,
    ) -> CoreResult<u32> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items \
             WHERE flight_id = $1 AND seat_class = $2 AND expires_at > $3 \
             AND ($4::uuid IS NULL OR id <> $4)",
        )
        .bind(flight_id)
        .bind(seat_class.as_str())
        .bind(now)
        .bind(excluding)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        to_u32(sum, "held quantity")
    }

    async fn tickets_for_flight(&mut self, flight_id: Uuid) -> CoreResult<Vec<Ticket>> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.flight_id = $1 ORDER BY t.created_at, t.id"
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&query)
            .bind(flight_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn insert_ticket(&mut self, ticket: &Ticket, passenger: &Passenger) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO tickets (id, purchase_id, user_id, flight_id, seat_class, seat_code, price_cents, \
             status, created_at, checkin_code, assigned_seat, checkin_completed, checkin_completed_at, boarding_pass) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(ticket.id)
        .bind(ticket.purchase_id)
        .bind(ticket.user_id)
        .bind(ticket.flight_id)
        .bind(ticket.seat_class.as_str())
        .bind(&ticket.seat_code)
        .bind(ticket.price_cents)
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .bind(&ticket.checkin_code)
        .bind(&ticket.assigned_seat)
        .bind(ticket.checkin_completed)
        .bind(ticket.checkin_completed_at)
        .bind(&ticket.boarding_pass)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO passengers (id, ticket_id, full_name, dni, email, phone, birth_date, gender) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(passenger.id)
        .bind(passenger.ticket_id)
        .bind(&passenger.full_name)
        .bind(passenger.dni.expose())
        .bind(&passenger.email)
        .bind(&passenger.phone)
        .bind(passenger.birth_date)
        .bind(&passenger.gender)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn ticket(&mut self, ticket_id: Uuid) -> CoreResult<Option<Ticket>> {
        let query = format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.id = $1");
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(TicketRow::into_ticket).transpose()
    }

    async fn passenger(&mut self, ticket_id: Uuid) -> CoreResult<Option<Passenger>> {
        let query = format!("SELECT {PASSENGER_COLUMNS} FROM passengers p WHERE p.ticket_id = $1");
        let row: Option<PassengerRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        Ok(row.map(PassengerRow::into_passenger))
    }

    async fn tickets_by_purchase(&mut self, purchase_id: Uuid) -> CoreResult<Vec<Ticket>> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.purchase_id = $1 ORDER BY t.created_at, t.id"
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&query)
            .bind(purchase_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn tickets_by_checkin_code(&mut self, code: &str) -> CoreResult<Vec<(Ticket, Passenger)>> {
        let query = format!(
            "SELECT {TICKET_COLUMNS}, {PASSENGER_COLUMNS} FROM tickets t \
             JOIN passengers p ON p.ticket_id = t.id \
             WHERE t.checkin_code = $1 ORDER BY t.created_at, t.id"
        );
        let rows: Vec<TicketPassengerRow> = sqlx::query_as(&query)
            .bind(code)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| Ok((row.ticket.into_ticket()?, row.passenger.into_passenger())))
            .collect()
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> CoreResult<()> {
        sqlx::query(
            "UPDATE tickets SET status = $2, checkin_code = $3, assigned_seat = $4, \
             checkin_completed = $5, checkin_completed_at = $6, boarding_pass = $7 WHERE id = $1",
        )
        .bind(ticket.id)
        .bind(ticket.status.as_str())
        .bind(&ticket.checkin_code)
        .bind(&ticket.assigned_seat)
        .bind(ticket.checkin_completed)
        .bind(ticket.checkin_completed_at)
        .bind(&ticket.boarding_pass)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }
}
