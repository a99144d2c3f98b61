use serde::Serialize;
use uuid::Uuid;
use volar_core::{CoreError, CoreResult};
use volar_shared::SeatClass;

/// One priced line: base fare times quantity
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuoteLine {
    pub flight_id: Uuid,
    pub seat_class: SeatClass,
    pub unit_fare_cents: i64,
    pub quantity: u32,
    pub subtotal_cents: i64,
}

impl QuoteLine {
    pub fn new(
        flight_id: Uuid,
        seat_class: SeatClass,
        unit_fare_cents: i64,
        quantity: u32,
    ) -> CoreResult<Self> {
        if unit_fare_cents < 0 {
            return Err(CoreError::Validation(format!(
                "negative fare configured for flight {} ({})",
                flight_id, seat_class
            )));
        }
        let subtotal_cents = unit_fare_cents
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| CoreError::Validation("price overflow".to_string()))?;

        Ok(Self {
            flight_id,
            seat_class,
            unit_fare_cents,
            quantity,
            subtotal_cents,
        })
    }
}

/// Priced cart
#[derive(Debug, Clone, Default, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub total_cents: i64,
}

impl Quote {
    pub fn add_line(&mut self, line: QuoteLine) -> CoreResult<()> {
        self.total_cents = self
            .total_cents
            .checked_add(line.subtotal_cents)
            .ok_or_else(|| CoreError::Validation("price overflow".to_string()))?;
        self.lines.push(line);
        Ok(())
    }

    /// Unit fare quoted for a flight+class, if the quote covers it
    pub fn unit_fare(&self, flight_id: Uuid, seat_class: SeatClass) -> Option<i64> {
        self.lines
            .iter()
            .find(|l| l.flight_id == flight_id && l.seat_class == seat_class)
            .map(|l| l.unit_fare_cents)
    }
}
