//! Online check-in.
//!
//! A ticket moves `Booked -> CodeIssued -> SeatChosen -> CheckedIn`.
//! Validation of `(code, dni)` is a transient step between the first two
//! persisted states and is repeated implicitly by every later operation
//! through the window check.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use volar_core::{BookingTx, CoreError, CoreResult};
use volar_shared::models::booking::CheckinState;
use volar_shared::models::events::{CheckinConfirmation, CHECKIN_CONFIRMATION_TEMPLATE};
use volar_shared::{SeatClass, Ticket};

use crate::fulfillment::{boarding_pass_qr_data, boarding_pass_reference};
use crate::inventory::{occupied_seats, FlightInventory};
use crate::BookingContext;

const MIN_CODE_LENGTH: usize = 4;

/// Check-in code: SHA-256 over dni, flight, ticket and time, as uppercase hex,
/// truncated to `length` characters.
pub fn derive_checkin_code(
    dni: &str,
    flight_id: Uuid,
    ticket_id: Uuid,
    at: DateTime<Utc>,
    length: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}|{}|{}|{}",
            dni.trim().to_uppercase(),
            flight_id,
            ticket_id,
            at.timestamp_millis()
        )
        .as_bytes(),
    );
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect();

    let length = length.clamp(MIN_CODE_LENGTH, hex.len());
    hex[..length].to_string()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedTicket {
    pub ticket_id: Uuid,
    pub purchase_id: Uuid,
    pub flight_id: Uuid,
    pub flight_number: String,
    pub departure_at: DateTime<Utc>,
    pub seat_class: SeatClass,
    pub seat_code: String,
    pub passenger_name: String,
    pub state: CheckinState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMapEntry {
    pub code: String,
    pub seat_class: SeatClass,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub flight_id: Uuid,
    pub seats: Vec<SeatMapEntry>,
}

impl SeatMap {
    pub fn status_of(&self, code: &str) -> Option<SeatStatus> {
        self.seats.iter().find(|s| s.code == code).map(|s| s.status)
    }

    pub fn available(&self, seat_class: SeatClass) -> usize {
        self.seats
            .iter()
            .filter(|s| s.seat_class == seat_class && s.status == SeatStatus::Available)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckinReceipt {
    pub ticket_id: Uuid,
    pub seat_code: String,
    pub boarding_pass: String,
    pub qr_data: String,
    pub completed_at: DateTime<Utc>,
    pub notification_sent: bool,
}

pub struct CheckinEngine {
    ctx: BookingContext,
}

impl CheckinEngine {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }

    /// `departure - now` must be positive and at most the window.
    fn ensure_window(&self, departure_at: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
        let until_departure = departure_at - now;
        if until_departure <= Duration::zero() {
            return Err(CoreError::OutsideWindow("flight has already departed".to_string()));
        }
        let window = Duration::hours(self.ctx.rules.checkin_window_hours);
        if until_departure > window {
            return Err(CoreError::OutsideWindow(format!(
                "check-in opens {} hours before departure",
                self.ctx.rules.checkin_window_hours
            )));
        }
        Ok(())
    }

    /// Give the ticket a check-in code, shared with every paid ticket of
    /// the same purchase. Returns the existing code if one was issued already.
    #[instrument(skip(self))]
    pub async fn issue_code(&self, ticket_id: Uuid) -> CoreResult<String> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let ticket = tx
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ticket {}", ticket_id)))?;
        if !ticket.is_paid() {
            return Err(CoreError::Conflict(format!(
                "ticket {} is {}",
                ticket_id,
                ticket.status.as_str()
            )));
        }
        if let Some(code) = ticket.checkin_code {
            return Ok(code);
        }

        let siblings = tx.tickets_by_purchase(ticket.purchase_id).await?;
        let code = match siblings.iter().find_map(|t| t.checkin_code.clone()) {
            Some(code) => code,
            None => {
                let passenger = tx
                    .passenger(ticket.id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("passenger of ticket {}", ticket_id)))?;
                derive_checkin_code(
                    passenger.dni.expose(),
                    ticket.flight_id,
                    ticket.id,
                    now,
                    self.ctx.rules.checkin_code_length,
                )
            }
        };

        for mut sibling in siblings {
            if sibling.is_paid() && sibling.checkin_code.is_none() {
                sibling.checkin_code = Some(code.clone());
                tx.update_ticket(&sibling).await?;
            }
        }
        tx.commit().await?;

        info!(purchase_id = %ticket.purchase_id, "Check-in code issued");
        Ok(code)
    }

    /// Find the ticket under `code` whose passenger carries `dni`.
    #[instrument(skip(self, dni))]
    pub async fn validate(&self, code: &str, dni: &str) -> CoreResult<ValidatedTicket> {
        let now = self.ctx.clock.now();
        let code = normalize_code(code);
        let mut tx = self.ctx.store.begin().await?;

        let under_code: Vec<_> = tx
            .tickets_by_checkin_code(&code)
            .await?
            .into_iter()
            .filter(|(t, _)| t.is_paid())
            .collect();
        if under_code.is_empty() {
            return Err(CoreError::NotFound("check-in code".to_string()));
        }

        let mut matching: Vec<_> = under_code
            .into_iter()
            .filter(|(_, p)| p.dni_matches(dni))
            .collect();
        // Several tickets under one traveler: prefer one still open for check-in.
        matching.sort_by_key(|(t, _)| t.checkin_completed);
        let Some((ticket, passenger)) = matching.into_iter().next() else {
            warn!("Check-in code found but document number did not match");
            return Err(CoreError::DniMismatch);
        };

        let flight = tx
            .flight(ticket.flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", ticket.flight_id)))?;
        self.ensure_window(flight.departure_at, now)?;
        if ticket.checkin_completed {
            return Err(CoreError::AlreadyCheckedIn(ticket.id));
        }

        Ok(ValidatedTicket {
            ticket_id: ticket.id,
            purchase_id: ticket.purchase_id,
            flight_id: flight.id,
            flight_number: flight.flight_number,
            departure_at: flight.departure_at,
            seat_class: ticket.seat_class,
            seat_code: ticket.current_seat().to_string(),
            passenger_name: passenger.full_name,
            state: ticket.checkin_state(),
        })
    }

    /// Every seat of the flight's cabin with its occupancy
    pub async fn seat_map(&self, flight_id: Uuid) -> CoreResult<SeatMap> {
        let mut tx = self.ctx.store.begin().await?;
        let inventory = FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), flight_id).await?;
        let tickets = tx.tickets_for_flight(flight_id).await?;
        let occupied = occupied_seats(&tickets, None);

        let seats = inventory
            .layout()
            .slots()
            .iter()
            .map(|slot| SeatMapEntry {
                code: slot.code.clone(),
                seat_class: slot.seat_class,
                status: if occupied.contains(&slot.code) {
                    SeatStatus::Occupied
                } else {
                    SeatStatus::Available
                },
            })
            .collect();

        Ok(SeatMap { flight_id, seats })
    }

    /// Choose (or re-choose) the ticket's seat. Re-selecting the ticket's
    /// own current seat succeeds without change.
    #[instrument(skip(self, code))]
    pub async fn assign_seat(&self, code: &str, ticket_id: Uuid, seat_code: &str) -> CoreResult<Ticket> {
        let now = self.ctx.clock.now();
        let seat_code = seat_code.trim().to_uppercase();
        let mut tx = self.ctx.store.begin().await?;

        let mut ticket = ticket_under_code(&mut *tx, code, ticket_id).await?;
        let inventory =
            FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), ticket.flight_id).await?;
        self.ensure_window(inventory.flight.departure_at, now)?;
        if ticket.checkin_completed {
            return Err(CoreError::AlreadyCheckedIn(ticket.id));
        }

        tx.lock_inventory(ticket.flight_id).await?;
        let seat_class = inventory
            .layout()
            .class_of(&seat_code)
            .ok_or_else(|| CoreError::Validation(format!("seat {} does not exist on this flight", seat_code)))?;

        let tickets = tx.tickets_for_flight(ticket.flight_id).await?;
        if occupied_seats(&tickets, Some(ticket.id)).contains(&seat_code) {
            return Err(CoreError::Conflict(format!("seat {} is already taken", seat_code)));
        }
        if seat_class != ticket.seat_class {
            return Err(CoreError::ClassMismatch {
                seat: seat_code,
                expected: ticket.seat_class,
                found: seat_class,
            });
        }

        if ticket.assigned_seat.as_deref() != Some(seat_code.as_str()) {
            ticket.assigned_seat = Some(seat_code);
            tx.update_ticket(&ticket).await?;
        }
        tx.commit().await?;

        info!(%ticket_id, seat = ticket.current_seat(), "Seat assigned");
        Ok(ticket)
    }

    /// Complete check-in and issue the boarding pass. The check-in code
    /// stays on the ticket for the other travelers of the purchase.
    #[instrument(skip(self, code))]
    pub async fn confirm(&self, code: &str, ticket_id: Uuid) -> CoreResult<CheckinReceipt> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut ticket = ticket_under_code(&mut *tx, code, ticket_id).await?;
        let flight = tx
            .flight(ticket.flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", ticket.flight_id)))?;
        self.ensure_window(flight.departure_at, now)?;
        if ticket.checkin_completed {
            return Err(CoreError::AlreadyCheckedIn(ticket.id));
        }
        let Some(seat_code) = ticket.assigned_seat.clone() else {
            return Err(CoreError::SeatNotChosen(ticket.id));
        };

        let boarding_pass = boarding_pass_reference(ticket.id, now);
        ticket.checkin_completed = true;
        ticket.checkin_completed_at = Some(now);
        ticket.boarding_pass = Some(boarding_pass.clone());
        tx.update_ticket(&ticket).await?;
        let passenger = tx.passenger(ticket.id).await?;
        tx.commit().await?;

        info!(%ticket_id, seat = %seat_code, %boarding_pass, "Check-in completed");

        let notification_sent = match passenger {
            Some(passenger) => {
                let payload = CheckinConfirmation {
                    ticket_id: ticket.id,
                    flight_number: flight.flight_number.clone(),
                    departure_at: flight.departure_at,
                    seat_code: seat_code.clone(),
                    passenger_name: passenger.full_name,
                    boarding_pass: boarding_pass.clone(),
                    completed_at: now,
                };
                match serde_json::to_value(&payload) {
                    Ok(value) => {
                        self.ctx
                            .notify(CHECKIN_CONFIRMATION_TEMPLATE, &passenger.email, value)
                            .await
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not encode check-in confirmation");
                        false
                    }
                }
            }
            None => false,
        };

        Ok(CheckinReceipt {
            ticket_id: ticket.id,
            qr_data: boarding_pass_qr_data(&boarding_pass, ticket.id, &seat_code),
            seat_code,
            boarding_pass,
            completed_at: now,
            notification_sent,
        })
    }
}

/// Paid ticket `ticket_id`, provided it carries `code`
async fn ticket_under_code(tx: &mut dyn BookingTx, code: &str, ticket_id: Uuid) -> CoreResult<Ticket> {
    let code = normalize_code(code);
    let ticket = tx
        .ticket(ticket_id)
        .await?
        .filter(|t| t.checkin_code.as_deref() == Some(code.as_str()))
        .ok_or_else(|| CoreError::NotFound(format!("ticket {} under this check-in code", ticket_id)))?;

    if !ticket.is_paid() {
        return Err(CoreError::Conflict(format!(
            "ticket {} is {}",
            ticket_id,
            ticket.status.as_str()
        )));
    }
    Ok(ticket)
}
