//! Checkout: turns the user's held seats into paid, seated tickets.
//!
//! Everything up to and including the balance debit happens in one store
//! transaction. Any error before commit leaves no tickets behind and the
//! balance untouched. Confirmations go out after commit and their failures
//! are only logged.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use volar_catalog::{Quote, QuoteLine};
use volar_core::{CoreError, CoreResult};
use volar_shared::models::events::{BookingConfirmation, BOOKING_CONFIRMATION_TEMPLATE};
use volar_shared::{Passenger, PassengerDetails, SeatClass, Ticket};

use crate::checkin::derive_checkin_code;
use crate::inventory::{occupied_seats, InventoryCache};
use crate::BookingContext;

/// Tickets requested for one flight+class, one passenger record per ticket
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub passengers: Vec<PassengerDetails>,
}

impl CheckoutLine {
    pub fn quantity(&self) -> u32 {
        u32::try_from(self.passengers.len()).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedTicket {
    pub ticket_id: Uuid,
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub seat_code: String,
    pub price_cents: i64,
    pub passenger_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub purchase_id: Uuid,
    pub checkin_code: String,
    pub total_cents: i64,
    pub remaining_balance_cents: i64,
    pub tickets: Vec<IssuedTicket>,
    pub notifications_failed: usize,
}

pub struct CheckoutEngine {
    ctx: BookingContext,
    seat_seed: Option<u64>,
}

impl CheckoutEngine {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx, seat_seed: None }
    }

    /// Seed the seat draw; every checkout then draws from the same sequence.
    pub fn with_seat_seed(mut self, seed: u64) -> Self {
        self.seat_seed = Some(seed);
        self
    }

    fn seat_rng(&self) -> StdRng {
        match self.seat_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn checkout(&self, user_id: Uuid, lines: &[CheckoutLine]) -> CoreResult<CheckoutReceipt> {
        let now = self.ctx.clock.now();
        let classifier = self.ctx.classifier.as_ref();
        let mut rng = self.seat_rng();
        let mut tx = self.ctx.store.begin().await?;

        // 1. User and balance
        let balance = tx
            .balance(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("account for user {}", user_id)))?;

        // 2. Active holds
        let cart = tx.cart_for_user(user_id).await?.ok_or(CoreError::EmptyCart)?;
        tx.delete_expired_holds(Some(cart.id), now).await?;
        let holds = tx.holds_for_cart(cart.id).await?;
        if holds.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        // 3. Lines must be covered by what is held, then price what they buy
        let mut held: BTreeMap<(Uuid, SeatClass), u32> = BTreeMap::new();
        for hold in &holds {
            *held.entry((hold.flight_id, hold.seat_class)).or_default() += hold.quantity;
        }
        let requested = verify_lines(lines, &held)?;

        let mut quote = Quote::default();
        for &(flight_id, seat_class) in held.keys() {
            let fare = tx
                .fare(flight_id, seat_class)
                .await?
                .ok_or(CoreError::RateNotConfigured { flight_id, seat_class })?;
            if let Some(&qty) = requested.get(&(flight_id, seat_class)) {
                quote.add_line(QuoteLine::new(flight_id, seat_class, fare, qty)?)?;
            }
        }

        // 4. Funds
        if balance < quote.total_cents {
            return Err(CoreError::InsufficientBalance {
                required: quote.total_cents,
                available: balance,
            });
        }

        // 5. Seat plans, once per flight
        let mut cache = InventoryCache::default();
        for hold in &holds {
            cache
                .get(&mut *tx, classifier, hold.flight_id)
                .await?
                .ensure_sellable(now)?;
        }

        // 6. Lock flights in id order, then draw seats
        let flights: BTreeSet<Uuid> = requested.keys().map(|(flight_id, _)| *flight_id).collect();
        let mut taken_by_flight: HashMap<Uuid, HashSet<String>> = HashMap::new();
        for &flight_id in &flights {
            tx.lock_inventory(flight_id).await?;
            let tickets = tx.tickets_for_flight(flight_id).await?;
            taken_by_flight.insert(flight_id, occupied_seats(&tickets, None));
        }

        let mut drawn_lines: Vec<(&CheckoutLine, Vec<String>)> = Vec::with_capacity(lines.len());
        for line in lines {
            let inventory = cache.get(&mut *tx, classifier, line.flight_id).await?;
            let codes = inventory.seat_codes(line.seat_class)?;
            let taken = taken_by_flight.entry(line.flight_id).or_default();
            let pool: Vec<String> = codes.into_iter().filter(|c| !taken.contains(c)).collect();

            let seats = draw_seats(pool, line.quantity(), &mut rng).map_err(|remaining| {
                warn!(flight_id = %line.flight_id, seat_class = %line.seat_class, remaining, "Seat pool exhausted");
                CoreError::NotEnoughSeats {
                    flight_id: line.flight_id,
                    seat_class: line.seat_class,
                    requested: line.quantity(),
                    remaining,
                }
            })?;
            taken.extend(seats.iter().cloned());
            drawn_lines.push((line, seats));
        }

        // 7. Tickets and passengers
        let purchase_id = Uuid::new_v4();
        let mut issued: Vec<(Ticket, Passenger)> = Vec::new();
        for (line, seats) in &drawn_lines {
            let price = quote
                .unit_fare(line.flight_id, line.seat_class)
                .ok_or(CoreError::RateNotConfigured {
                    flight_id: line.flight_id,
                    seat_class: line.seat_class,
                })?;
            for (seat, details) in seats.iter().zip(&line.passengers) {
                let ticket = Ticket::new_paid(
                    purchase_id,
                    user_id,
                    line.flight_id,
                    line.seat_class,
                    seat.clone(),
                    price,
                    now,
                );
                let passenger = Passenger::from_details(ticket.id, details);
                issued.push((ticket, passenger));
            }
        }

        let checkin_code = match issued.first() {
            Some((ticket, passenger)) => derive_checkin_code(
                passenger.dni.expose(),
                ticket.flight_id,
                ticket.id,
                now,
                self.ctx.rules.checkin_code_length,
            ),
            None => return Err(CoreError::Validation("checkout produced no tickets".to_string())),
        };

        // 8. Persist, clear the whole cart, debit, commit
        for (ticket, passenger) in issued.iter_mut() {
            ticket.checkin_code = Some(checkin_code.clone());
            tx.insert_ticket(ticket, passenger).await?;
        }
        tx.delete_holds_for_cart(cart.id).await?;
        if !tx.debit_balance(user_id, quote.total_cents).await? {
            return Err(CoreError::InsufficientBalance {
                required: quote.total_cents,
                available: balance,
            });
        }
        tx.commit().await?;

        info!(
            %purchase_id, tickets = issued.len(), total_cents = quote.total_cents,
            "Checkout committed"
        );

        // 9. Best-effort confirmations
        let mut notifications_failed = 0;
        for (ticket, passenger) in &issued {
            let Some(inventory) = cache.peek(ticket.flight_id) else {
                continue;
            };
            let payload = BookingConfirmation {
                purchase_id,
                ticket_id: ticket.id,
                flight_number: inventory.flight.flight_number.clone(),
                origin: inventory.flight.origin.clone(),
                destination: inventory.flight.destination.clone(),
                departure_at: inventory.flight.departure_at,
                seat_class: ticket.seat_class,
                seat_code: ticket.seat_code.clone(),
                passenger_name: passenger.full_name.clone(),
                checkin_code: ticket.checkin_code.clone(),
            };
            let sent = match serde_json::to_value(&payload) {
                Ok(value) => {
                    self.ctx
                        .notify(BOOKING_CONFIRMATION_TEMPLATE, &passenger.email, value)
                        .await
                }
                Err(e) => {
                    warn!(error = %e, "Could not encode booking confirmation");
                    false
                }
            };
            if !sent {
                notifications_failed += 1;
            }
        }

        Ok(CheckoutReceipt {
            purchase_id,
            checkin_code,
            total_cents: quote.total_cents,
            remaining_balance_cents: balance - quote.total_cents,
            tickets: issued
                .into_iter()
                .map(|(ticket, passenger)| IssuedTicket {
                    ticket_id: ticket.id,
                    flight_id: ticket.flight_id,
                    seat_class: ticket.seat_class,
                    seat_code: ticket.seat_code,
                    price_cents: ticket.price_cents,
                    passenger_name: passenger.full_name,
                })
                .collect(),
            notifications_failed,
        })
    }
}

/// Every line must be covered by held seats. Returns the tickets requested
/// per flight and class; held seats beyond that are released with the cart.
fn verify_lines(
    lines: &[CheckoutLine],
    held: &BTreeMap<(Uuid, SeatClass), u32>,
) -> CoreResult<BTreeMap<(Uuid, SeatClass), u32>> {
    if lines.is_empty() {
        return Err(CoreError::Validation("no checkout lines given".to_string()));
    }

    let mut requested: BTreeMap<(Uuid, SeatClass), u32> = BTreeMap::new();
    for line in lines {
        if line.passengers.is_empty() {
            return Err(CoreError::Validation(format!(
                "line for flight {} ({}) has no passengers",
                line.flight_id, line.seat_class
            )));
        }
        for details in &line.passengers {
            validate_passenger(details)?;
        }
        let entry = requested.entry((line.flight_id, line.seat_class)).or_default();
        *entry = entry.saturating_add(line.quantity());
    }

    for ((flight_id, seat_class), qty) in &requested {
        let reserved = held.get(&(*flight_id, *seat_class)).copied().unwrap_or(0);
        if *qty > reserved {
            return Err(CoreError::Validation(format!(
                "{} tickets requested for flight {} ({}) but only {} held",
                qty, flight_id, seat_class, reserved
            )));
        }
    }
    Ok(requested)
}

pub(crate) fn validate_passenger(details: &PassengerDetails) -> CoreResult<()> {
    if details.full_name.trim().is_empty() {
        return Err(CoreError::Validation("passenger name is required".to_string()));
    }
    if details.dni.expose().trim().is_empty() {
        return Err(CoreError::Validation("passenger document number is required".to_string()));
    }
    if !details.email.contains('@') {
        return Err(CoreError::Validation("passenger email is invalid".to_string()));
    }
    Ok(())
}

/// Draw `count` seats uniformly at random without replacement.
/// Returns the pool size when it is too small.
pub fn draw_seats<R: Rng + ?Sized>(mut pool: Vec<String>, count: u32, rng: &mut R) -> Result<Vec<String>, u32> {
    let count = count as usize;
    if pool.len() < count {
        return Err(u32::try_from(pool.len()).unwrap_or(u32::MAX));
    }
    let (chosen, _) = pool.partial_shuffle(rng, count);
    Ok(chosen.to_vec())
}
