pub mod clock;
pub mod notify;
pub mod repository;
pub mod rules;

use uuid::Uuid;
use volar_shared::SeatClass;

pub use clock::{Clock, FixedClock, SystemClock};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use repository::{BookingStore, BookingTx};
pub use rules::BookingRules;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not owner of {0}")]
    NotOwner(String),

    #[error("Insufficient capacity on flight {flight_id} ({seat_class}): requested {requested}, available {available}")]
    InsufficientCapacity {
        flight_id: Uuid,
        seat_class: SeatClass,
        requested: u32,
        available: u32,
    },

    #[error("Not enough seats on flight {flight_id} ({seat_class}): requested {requested}, remaining {remaining}")]
    NotEnoughSeats {
        flight_id: Uuid,
        seat_class: SeatClass,
        requested: u32,
        remaining: u32,
    },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("No fare configured for flight {flight_id} ({seat_class})")]
    RateNotConfigured { flight_id: Uuid, seat_class: SeatClass },

    #[error("Seat class {0} is not configured for this aircraft")]
    ClassNotConfigured(SeatClass),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Seat {seat} belongs to {found}, ticket was purchased in {expected}")]
    ClassMismatch {
        seat: String,
        expected: SeatClass,
        found: SeatClass,
    },

    #[error("Document number does not match any ticket under this code")]
    DniMismatch,

    #[error("Outside check-in window: {0}")]
    OutsideWindow(String),

    #[error("Ticket {0} is already checked in")]
    AlreadyCheckedIn(Uuid),

    #[error("Ticket {0} has no seat chosen yet")]
    SeatNotChosen(Uuid),

    #[error("Store error: {0}")]
    Store(String),
}

/// Coarse classification a transport layer can map onto status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Capacity,
    Payment,
    DataIntegrity,
    State,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::EmptyCart => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::NotOwner(_) => ErrorKind::Forbidden,
            CoreError::InsufficientCapacity { .. } | CoreError::NotEnoughSeats { .. } => {
                ErrorKind::Capacity
            }
            CoreError::InsufficientBalance { .. } => ErrorKind::Payment,
            CoreError::RateNotConfigured { .. } | CoreError::ClassNotConfigured(_) => {
                ErrorKind::DataIntegrity
            }
            CoreError::Conflict(_)
            | CoreError::ClassMismatch { .. }
            | CoreError::DniMismatch
            | CoreError::OutsideWindow(_)
            | CoreError::AlreadyCheckedIn(_)
            | CoreError::SeatNotChosen(_) => ErrorKind::State,
            CoreError::Store(_) => ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
