pub mod models;
pub mod pii;

pub use models::booking::{Cart, CartHold, Passenger, PassengerDetails, Ticket, TicketStatus};
pub use models::flight::{Flight, FlightStatus, RouteCategory, SeatClass, SeatPlan};
pub use pii::Masked;
