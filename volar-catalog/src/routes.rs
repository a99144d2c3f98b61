use std::collections::HashSet;
use uuid::Uuid;
use volar_shared::{Flight, RouteCategory};

/// Decides which seat table of an aircraft applies to a route.
///
/// Must be a pure function of the aircraft and the route endpoints so the
/// same flight always maps onto the same seat numbering.
pub trait RouteClassifier: Send + Sync {
    fn classify(&self, aircraft_id: Uuid, origin: &str, destination: &str) -> RouteCategory;

    fn classify_flight(&self, flight: &Flight) -> RouteCategory {
        self.classify(flight.aircraft_id, &flight.origin, &flight.destination)
    }
}

/// Domestic when both endpoints are in a configured city list
#[derive(Debug, Clone, Default)]
pub struct CityListClassifier {
    domestic_cities: HashSet<String>,
}

impl CityListClassifier {
    pub fn new<I, S>(cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domestic_cities: cities
                .into_iter()
                .map(|c| normalize(c.as_ref()))
                .collect(),
        }
    }

    fn is_domestic(&self, city: &str) -> bool {
        self.domestic_cities.contains(&normalize(city))
    }
}

fn normalize(city: &str) -> String {
    city.trim().to_lowercase()
}

impl RouteClassifier for CityListClassifier {
    fn classify(&self, _aircraft_id: Uuid, origin: &str, destination: &str) -> RouteCategory {
        if self.is_domestic(origin) && self.is_domestic(destination) {
            RouteCategory::Domestic
        } else {
            RouteCategory::International
        }
    }
}

/// Every route maps onto the same category
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub RouteCategory);

impl RouteClassifier for FixedClassifier {
    fn classify(&self, _aircraft_id: Uuid, _origin: &str, _destination: &str) -> RouteCategory {
        self.0
    }
}
