use serde::Deserialize;

/// Tunable booking rules. File defaults can be overridden at runtime from
/// the `business_rules` table.
#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_hold_validity_hours")]
    pub hold_validity_hours: i64,
    #[serde(default = "default_max_tickets_per_hold")]
    pub max_tickets_per_hold: u32,
    #[serde(default = "default_checkin_window_hours")]
    pub checkin_window_hours: i64,
    #[serde(default = "default_checkin_code_length")]
    pub checkin_code_length: usize,
}

fn default_hold_validity_hours() -> i64 { 24 }
fn default_max_tickets_per_hold() -> u32 { 5 }
fn default_checkin_window_hours() -> i64 { 24 }
fn default_checkin_code_length() -> usize { 8 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_validity_hours: default_hold_validity_hours(),
            max_tickets_per_hold: default_max_tickets_per_hold(),
            checkin_window_hours: default_checkin_window_hours(),
            checkin_code_length: default_checkin_code_length(),
        }
    }
}
