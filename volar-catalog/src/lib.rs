pub mod pricing;
pub mod routes;
pub mod seatmap;

pub use pricing::{Quote, QuoteLine};
pub use routes::{CityListClassifier, FixedClassifier, RouteClassifier};
pub use seatmap::{SeatLayout, SeatSlot};
