use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use volar_core::BookingRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay `business_rules` rows on top of the file defaults.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        Ok(apply_rule_overrides(defaults, rows))
    }
}

/// Expected row format: `{"value": <number>}`. Unknown keys are ignored.
pub fn apply_rule_overrides(defaults: BookingRules, rows: Vec<(String, Value)>) -> BookingRules {
    let mut rules = defaults;

    for (key, val) in rows {
        let Some(v) = val.get("value") else {
            warn!(rule_key = %key, "Business rule without a value field, skipping");
            continue;
        };
        match key.as_str() {
            "hold_validity_hours" => {
                if let Some(h) = v.as_i64().filter(|h| *h > 0) {
                    rules.hold_validity_hours = h;
                }
            }
            "max_tickets_per_hold" => {
                if let Some(n) = v.as_u64().and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0) {
                    rules.max_tickets_per_hold = n;
                }
            }
            "checkin_window_hours" => {
                if let Some(h) = v.as_i64().filter(|h| *h > 0) {
                    rules.checkin_window_hours = h;
                }
            }
            "checkin_code_length" => {
                if let Some(n) = v.as_u64().and_then(|n| usize::try_from(n).ok()).filter(|n| (4..=64).contains(n)) {
                    rules.checkin_code_length = n;
                }
            }
            _ => {}
        }
    }

    rules
}
