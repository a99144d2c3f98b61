use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Flight lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Cancelled,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "SCHEDULED",
            FlightStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for FlightStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(FlightStatus::Scheduled),
            "CANCELLED" => Ok(FlightStatus::Cancelled),
            other => Err(format!("unknown flight status: {}", other)),
        }
    }
}

/// A scheduled flight operated by one aircraft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub aircraft_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub status: FlightStatus,
}

impl Flight {
    /// A flight can take new holds and tickets while scheduled and not yet departed.
    pub fn is_sellable(&self, now: DateTime<Utc>) -> bool {
        self.status == FlightStatus::Scheduled && self.departure_at > now
    }
}

/// Cabin class. Declaration order is cabin order: premium seats are numbered first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeatClass {
    #[serde(rename = "primera_clase")]
    First,
    #[serde(rename = "economica")]
    Economy,
}

impl SeatClass {
    pub const ALL: [SeatClass; 2] = [SeatClass::First, SeatClass::Economy];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::First => "primera_clase",
            SeatClass::Economy => "economica",
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primera_clase" => Ok(SeatClass::First),
            "economica" => Ok(SeatClass::Economy),
            other => Err(format!("unknown seat class: {}", other)),
        }
    }
}

/// Route category used to pick which seat table of an aircraft applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteCategory {
    Domestic,
    International,
}

impl RouteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteCategory::Domestic => "DOMESTIC",
            RouteCategory::International => "INTERNATIONAL",
        }
    }
}

impl FromStr for RouteCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOMESTIC" => Ok(RouteCategory::Domestic),
            "INTERNATIONAL" => Ok(RouteCategory::International),
            other => Err(format!("unknown route category: {}", other)),
        }
    }
}

/// Per-class seat counts of one aircraft for one route category.
/// Source of truth for capacity; bookings never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatPlan {
    pub aircraft_id: Uuid,
    pub category: RouteCategory,
    pub seats: BTreeMap<SeatClass, u32>,
}

impl SeatPlan {
    pub fn new(aircraft_id: Uuid, category: RouteCategory) -> Self {
        Self {
            aircraft_id,
            category,
            seats: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, class: SeatClass, count: u32) -> Self {
        self.seats.insert(class, count);
        self
    }

    pub fn capacity(&self, class: SeatClass) -> Option<u32> {
        self.seats.get(&class).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_class_wire_names() {
        let json = serde_json::to_string(&SeatClass::First).unwrap();
        assert_eq!(json, "\"primera_clase\"");
        let class: SeatClass = serde_json::from_str("\"economica\"").unwrap();
        assert_eq!(class, SeatClass::Economy);
        assert_eq!("primera_clase".parse::<SeatClass>().unwrap(), SeatClass::First);
        assert!("business".parse::<SeatClass>().is_err());
    }

    #[test]
    fn test_sellable_window() {
        let now = Utc::now();
        let mut flight = Flight {
            id: Uuid::new_v4(),
            flight_number: "VL100".to_string(),
            aircraft_id: Uuid::new_v4(),
            origin: "Madrid".to_string(),
            destination: "Sevilla".to_string(),
            departure_at: now + chrono::Duration::hours(2),
            arrival_at: now + chrono::Duration::hours(3),
            status: FlightStatus::Scheduled,
        };
        assert!(flight.is_sellable(now));

        flight.status = FlightStatus::Cancelled;
        assert!(!flight.is_sellable(now));

        flight.status = FlightStatus::Scheduled;
        assert!(!flight.is_sellable(now + chrono::Duration::hours(2)));
    }
}
