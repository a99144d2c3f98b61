use serde::Deserialize;
use std::env;
use volar_core::BookingRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub routes: RouteConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Empty brokers disables Kafka and notifications are only logged
    #[serde(default)]
    pub brokers: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
}

fn default_notification_topic() -> String { "notifications.outbound".to_string() }

/// Input of the route classifier: cities whose pairings count as domestic
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RouteConfig {
    #[serde(default)]
    pub domestic_cities: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_sweep_interval() -> u64 { 60 }

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment and local overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `VOLAR_BOOKING__HOLD_VALIDITY_HOURS=2`
            .add_source(config::Environment::with_prefix("VOLAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_when_missing() {
        let s = config::Config::builder()
            .set_override("database.url", "postgres://localhost/volar")
            .unwrap()
            .set_override("kafka.brokers", "")
            .unwrap()
            .build()
            .unwrap();
        let cfg: Config = s.try_deserialize().unwrap();

        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.kafka.notification_topic, "notifications.outbound");
        assert_eq!(cfg.booking.hold_validity_hours, 24);
        assert_eq!(cfg.booking.max_tickets_per_hold, 5);
        assert_eq!(cfg.booking.checkin_window_hours, 24);
        assert!(cfg.routes.domestic_cities.is_empty());
        assert_eq!(cfg.worker.sweep_interval_seconds, 60);
    }

    #[test]
    fn test_booking_overrides() {
        let s = config::Config::builder()
            .set_override("database.url", "postgres://localhost/volar")
            .unwrap()
            .set_override("kafka.brokers", "localhost:9092")
            .unwrap()
            .set_override("booking.hold_validity_hours", 2)
            .unwrap()
            .set_override("routes.domestic_cities", vec!["Madrid", "Sevilla"])
            .unwrap()
            .build()
            .unwrap();
        let cfg: Config = s.try_deserialize().unwrap();

        assert_eq!(cfg.booking.hold_validity_hours, 2);
        assert_eq!(cfg.booking.max_tickets_per_hold, 5);
        assert_eq!(cfg.routes.domestic_cities, vec!["Madrid", "Sevilla"]);
    }
}
