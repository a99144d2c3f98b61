//! Cart holds: expiring claims on seats of a flight+class.
//!
//! Expiry is never scheduled. Every operation touching a cart first deletes
//! that cart's expired holds, and availability sums only count holds whose
//! expiry lies in the future, so an expired hold that is still stored never
//! counts against capacity.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use volar_core::{BookingTx, CoreError, CoreResult};
use volar_shared::{Cart, CartHold, SeatClass};

use crate::availability::{self, Availability};
use crate::inventory::{FlightInventory, InventoryCache};
use crate::BookingContext;

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub hold: CartHold,
    pub flight_number: String,
    pub capacity: u32,
    /// Advisory: may already be stale when the caller reads it
    pub available: u32,
    pub seconds_to_expiry: i64,
    pub unit_fare_cents: Option<i64>,
    pub subtotal_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartItemView>,
    pub total_cents: i64,
}

/// Owns carts and their holds
#[derive(Clone)]
pub struct HoldStore {
    ctx: BookingContext,
}

impl HoldStore {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }

    fn validate_quantity(&self, quantity: u32) -> CoreResult<()> {
        let max = self.ctx.rules.max_tickets_per_hold;
        if quantity == 0 || quantity > max {
            return Err(CoreError::Validation(format!(
                "quantity must be between 1 and {}, got {}",
                max, quantity
            )));
        }
        Ok(())
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::hours(self.ctx.rules.hold_validity_hours)
    }

    /// Idempotent 1:1 cart creation
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> CoreResult<Cart> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let cart = ensure_cart(&mut *tx, user_id, now).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Sweeps the user's expired holds, then returns the live ones with
    /// current availability, capacity and time left.
    #[instrument(skip(self))]
    pub async fn get_active_items(&self, user_id: Uuid) -> CoreResult<CartView> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let cart = ensure_cart(&mut *tx, user_id, now).await?;

        let swept = tx.delete_expired_holds(Some(cart.id), now).await?;
        if swept > 0 {
            debug!(cart_id = %cart.id, swept, "Swept expired holds");
        }

        let holds = tx.holds_for_cart(cart.id).await?;
        let mut cache = InventoryCache::default();
        let mut items = Vec::with_capacity(holds.len());
        let mut total_cents = 0i64;

        for hold in holds {
            let inventory = cache
                .get(&mut *tx, self.ctx.classifier.as_ref(), hold.flight_id)
                .await?;
            let flight_number = inventory.flight.flight_number.clone();
            let capacity = inventory.capacity(hold.seat_class)?;
            let availability =
                availability::compute(&mut *tx, hold.flight_id, hold.seat_class, capacity, now, None)
                    .await?;

            let unit_fare_cents = tx.fare(hold.flight_id, hold.seat_class).await?;
            let subtotal_cents = unit_fare_cents.and_then(|f| f.checked_mul(i64::from(hold.quantity)));
            total_cents = total_cents.saturating_add(subtotal_cents.unwrap_or(0));

            items.push(CartItemView {
                seconds_to_expiry: hold.seconds_to_expiry(now),
                hold,
                flight_number,
                capacity,
                available: availability.available,
                unit_fare_cents,
                subtotal_cents,
            });
        }

        tx.commit().await?;

        Ok(CartView {
            cart_id: cart.id,
            items,
            total_cents,
        })
    }

    /// Advisory availability read for a flight+class
    pub async fn availability(&self, flight_id: Uuid, seat_class: SeatClass) -> CoreResult<Availability> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let inventory = FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), flight_id).await?;
        let capacity = inventory.capacity(seat_class)?;
        availability::compute(&mut *tx, flight_id, seat_class, capacity, now, None).await
    }

    /// Hold `quantity` more seats. An unexpired hold for the same flight+class
    /// grows (capped at the per-hold maximum) and gets a fresh expiry.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        seat_class: SeatClass,
        quantity: u32,
    ) -> CoreResult<CartHold> {
        self.validate_quantity(quantity)?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let inventory = FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), flight_id).await?;
        inventory.ensure_sellable(now)?;
        let capacity = inventory.capacity(seat_class)?;

        tx.lock_inventory(flight_id).await?;
        let cart = ensure_cart(&mut *tx, user_id, now).await?;
        tx.delete_expired_holds(Some(cart.id), now).await?;

        let existing = tx
            .holds_for_cart(cart.id)
            .await?
            .into_iter()
            .find(|h| h.flight_id == flight_id && h.seat_class == seat_class && h.is_active(now));

        let new_total = existing
            .as_ref()
            .map_or(quantity, |h| h.quantity.saturating_add(quantity))
            .min(self.ctx.rules.max_tickets_per_hold);

        let current = availability::compute(
            &mut *tx,
            flight_id,
            seat_class,
            capacity,
            now,
            existing.as_ref().map(|h| h.id),
        )
        .await?;

        if !current.admits(new_total) {
            warn!(
                %flight_id, %seat_class, requested = new_total, available = current.available,
                "Hold rejected: insufficient capacity"
            );
            return Err(CoreError::InsufficientCapacity {
                flight_id,
                seat_class,
                requested: new_total,
                available: current.available,
            });
        }

        let hold = match existing {
            Some(mut hold) => {
                hold.quantity = new_total;
                hold.expires_at = self.expiry_from(now);
                tx.update_hold(&hold).await?;
                hold
            }
            None => {
                let hold = CartHold {
                    id: Uuid::new_v4(),
                    cart_id: cart.id,
                    flight_id,
                    seat_class,
                    quantity: new_total,
                    expires_at: self.expiry_from(now),
                    created_at: now,
                };
                tx.insert_hold(&hold).await?;
                hold
            }
        };

        tx.commit().await?;
        info!(hold_id = %hold.id, quantity = hold.quantity, expires_at = %hold.expires_at, "Hold saved");
        Ok(hold)
    }

    /// Set a hold's quantity. The capacity check leaves the hold's own current
    /// quantity out of the occupied count. Expiry is unchanged.
    #[instrument(skip(self))]
    pub async fn update_item(&self, user_id: Uuid, hold_id: Uuid, quantity: u32) -> CoreResult<CartHold> {
        self.validate_quantity(quantity)?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut hold = owned_hold(&mut *tx, user_id, hold_id).await?;

        if !hold.is_active(now) {
            tx.delete_hold(hold.id).await?;
            tx.commit().await?;
            return Err(CoreError::NotFound(format!("hold {} has expired", hold_id)));
        }

        let inventory =
            FlightInventory::load(&mut *tx, self.ctx.classifier.as_ref(), hold.flight_id).await?;
        let capacity = inventory.capacity(hold.seat_class)?;

        tx.lock_inventory(hold.flight_id).await?;
        let current = availability::compute(
            &mut *tx,
            hold.flight_id,
            hold.seat_class,
            capacity,
            now,
            Some(hold.id),
        )
        .await?;

        if !current.admits(quantity) {
            warn!(
                flight_id = %hold.flight_id, requested = quantity, available = current.available,
                "Hold update rejected: insufficient capacity"
            );
            return Err(CoreError::InsufficientCapacity {
                flight_id: hold.flight_id,
                seat_class: hold.seat_class,
                requested: quantity,
                available: current.available,
            });
        }

        hold.quantity = quantity;
        tx.update_hold(&hold).await?;
        tx.commit().await?;

        info!(hold_id = %hold.id, quantity, "Hold updated");
        Ok(hold)
    }

    /// Delete a hold. Returns whether anything was deleted; deleting a hold
    /// that is already gone is not an error.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, hold_id: Uuid) -> CoreResult<bool> {
        let mut tx = self.ctx.store.begin().await?;

        match owned_hold(&mut *tx, user_id, hold_id).await {
            Ok(hold) => {
                tx.delete_hold(hold.id).await?;
                tx.commit().await?;
                info!(%hold_id, "Hold removed");
                Ok(true)
            }
            Err(CoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete every hold in the user's cart. Clearing an empty cart is a no-op.
    pub async fn clear_cart(&self, user_id: Uuid) -> CoreResult<u64> {
        let mut tx = self.ctx.store.begin().await?;
        let Some(cart) = tx.cart_for_user(user_id).await? else {
            return Ok(0);
        };
        let deleted = tx.delete_holds_for_cart(cart.id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Delete expired holds across all carts
    pub async fn sweep_expired(&self) -> CoreResult<u64> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let deleted = tx.delete_expired_holds(None, now).await?;
        tx.commit().await?;
        if deleted > 0 {
            info!(deleted, "Expired holds swept");
        }
        Ok(deleted)
    }
}

pub(crate) async fn ensure_cart(
    tx: &mut dyn BookingTx,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Cart> {
    if let Some(cart) = tx.cart_for_user(user_id).await? {
        return Ok(cart);
    }
    tx.insert_cart(&Cart::new(user_id, now)).await?;
    tx.cart_for_user(user_id)
        .await?
        .ok_or_else(|| CoreError::Store(format!("cart for user {} was not created", user_id)))
}

async fn owned_hold(tx: &mut dyn BookingTx, user_id: Uuid, hold_id: Uuid) -> CoreResult<CartHold> {
    let hold = tx
        .hold(hold_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("hold {}", hold_id)))?;

    let owns = tx
        .cart_for_user(user_id)
        .await?
        .is_some_and(|cart| cart.id == hold.cart_id);

    if !owns {
        return Err(CoreError::NotOwner(format!("hold {}", hold_id)));
    }
    Ok(hold)
}
