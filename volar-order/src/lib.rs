pub mod availability;
pub mod cart;
pub mod checkin;
pub mod checkout;
pub mod fulfillment;
pub mod inventory;
pub mod issuance;

use std::sync::Arc;
use serde_json::Value;
use volar_catalog::RouteClassifier;
use volar_core::{BookingRules, BookingStore, Clock, Notifier};

pub use availability::Availability;
pub use cart::{CartItemView, CartView, HoldStore};
pub use checkin::{CheckinEngine, CheckinReceipt, SeatMap, SeatMapEntry, SeatStatus, ValidatedTicket};
pub use checkout::{CheckoutEngine, CheckoutLine, CheckoutReceipt, IssuedTicket};
pub use issuance::{IssueRequest, TicketIssuer};

/// Collaborators shared by every engine
#[derive(Clone)]
pub struct BookingContext {
    pub store: Arc<dyn BookingStore>,
    pub clock: Arc<dyn Clock>,
    pub classifier: Arc<dyn RouteClassifier>,
    pub notifier: Arc<dyn Notifier>,
    pub rules: BookingRules,
}

impl BookingContext {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        classifier: Arc<dyn RouteClassifier>,
        notifier: Arc<dyn Notifier>,
        rules: BookingRules,
    ) -> Self {
        Self {
            store,
            clock,
            classifier,
            notifier,
            rules,
        }
    }

    /// Send a notification, logging instead of failing. Returns whether it went out.
    pub(crate) async fn notify(&self, template: &str, recipient: &str, payload: Value) -> bool {
        match self.notifier.send(template, recipient, payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(template, error = %e, "Notification failed, state already committed");
                false
            }
        }
    }
}
