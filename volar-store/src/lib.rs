pub mod app_config;
pub mod database;
pub mod events;
pub mod memory;
pub mod postgres;

pub use database::DbClient;
pub use events::KafkaNotifier;
pub use memory::MemoryStore;
pub use postgres::PgBookingStore;
