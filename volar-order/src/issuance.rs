//! Direct ticket issuance, without a cart or balance debit.
//!
//! Used by back-office flows. The seat is the lowest free code of the class
//! in cabin order rather than a random draw.

use serde_json::to_value;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use volar_core::{CoreError, CoreResult};
use volar_shared::models::events::{BookingConfirmation, BOOKING_CONFIRMATION_TEMPLATE};
use volar_shared::{Passenger, PassengerDetails, SeatClass, Ticket, TicketStatus};

use crate::availability;
use crate::checkin::derive_checkin_code;
use crate::checkout::validate_passenger;
use crate::inventory::{occupied_seats, FlightInventory};
use crate::BookingContext;

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub passenger: PassengerDetails,
    /// Charged instead of the configured fare when set
    pub price_override_cents: Option<i64>,
}

pub struct TicketIssuer {
    ctx: BookingContext,
}

impl TicketIssuer {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, flight_id = %request.flight_id))]
    pub async fn issue(&self, request: IssueRequest) -> CoreResult<Ticket> {
        validate_passenger(&request.passenger)?;
        if request.price_override_cents.is_some_and(|p| p < 0) {
            return Err(CoreError::Validation("price must not be negative".to_string()));
        }

        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let inventory =
            FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), request.flight_id).await?;
        inventory.ensure_sellable(now)?;
        let capacity = inventory.capacity(request.seat_class)?;

        tx.lock_inventory(request.flight_id).await?;
        let current =
            availability::compute(&mut *tx, request.flight_id, request.seat_class, capacity, now, None)
                .await?;
        if !current.admits(1) {
            return Err(CoreError::InsufficientCapacity {
                flight_id: request.flight_id,
                seat_class: request.seat_class,
                requested: 1,
                available: current.available,
            });
        }

        let price_cents = match request.price_override_cents {
            Some(price) => price,
            None => tx
                .fare(request.flight_id, request.seat_class)
                .await?
                .ok_or(CoreError::RateNotConfigured {
                    flight_id: request.flight_id,
                    seat_class: request.seat_class,
                })?,
        };

        let tickets = tx.tickets_for_flight(request.flight_id).await?;
        let occupied = occupied_seats(&tickets, None);
        let seat_code = inventory
            .seat_codes(request.seat_class)?
            .into_iter()
            .find(|code| !occupied.contains(code))
            .ok_or(CoreError::NotEnoughSeats {
                flight_id: request.flight_id,
                seat_class: request.seat_class,
                requested: 1,
                remaining: 0,
            })?;

        let mut ticket = Ticket::new_paid(
            Uuid::new_v4(),
            request.user_id,
            request.flight_id,
            request.seat_class,
            seat_code,
            price_cents,
            now,
        );
        let passenger = Passenger::from_details(ticket.id, &request.passenger);
        ticket.checkin_code = Some(derive_checkin_code(
            passenger.dni.expose(),
            ticket.flight_id,
            ticket.id,
            now,
            self.ctx.rules.checkin_code_length,
        ));

        tx.insert_ticket(&ticket, &passenger).await?;
        tx.commit().await?;

        info!(ticket_id = %ticket.id, seat = %ticket.seat_code, price_cents, "Ticket issued");

        let payload = BookingConfirmation {
            purchase_id: ticket.purchase_id,
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
        match to_value(&payload) {
            Ok(value) => {
                self.ctx
                    .notify(BOOKING_CONFIRMATION_TEMPLATE, &passenger.email, value)
                    .await;
            }
            Err(e) => warn!(error = %e, "Could not encode booking confirmation"),
        }

        Ok(ticket)
    }

    /// Cancel a ticket, releasing its capacity and seat. Cancelling a
    /// cancelled ticket returns it unchanged.
    #[instrument(skip(self))]
    pub async fn cancel(&self, ticket_id: Uuid) -> CoreResult<Ticket> {
        let mut tx = self.ctx.store.begin().await?;
        let mut ticket = tx
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ticket {}", ticket_id)))?;

        match ticket.status {
            TicketStatus::Cancelled => return Ok(ticket),
            TicketStatus::Used => {
                return Err(CoreError::Conflict(format!("ticket {} was already used", ticket_id)))
            }
            TicketStatus::Paid if ticket.checkin_completed => {
                return Err(CoreError::Conflict(format!(
                    "ticket {} is checked in and cannot be cancelled",
                    ticket_id
                )))
            }
            TicketStatus::Paid => {}
        }

        ticket.status = TicketStatus::Cancelled;
        tx.update_ticket(&ticket).await?;
        tx.commit().await?;

        info!(%ticket_id, "Ticket cancelled");
        Ok(ticket)
    }
}
