//! Deterministic seat-code generation.
//!
//! Seat codes are `{Column}{Row}` with columns `A`..`F`. Classes share one
//! cabin numbering sequence in [`SeatClass`] order: premium seats start at
//! `A1` and every following class picks up exactly where the previous one
//! stopped, possibly mid-row. Occupancy is computed by matching stored seat
//! strings against this list, so the output must never depend on anything
//! but the seat counts.

use serde::Serialize;
use std::collections::BTreeMap;
use volar_core::{CoreError, CoreResult};
use volar_shared::{SeatClass, SeatPlan};

pub const COLUMNS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

const ROW_WIDTH: u32 = COLUMNS.len() as u32;

/// Ordered seat codes of `class`, length `counts[class]`.
pub fn generate(counts: &BTreeMap<SeatClass, u32>, class: SeatClass) -> CoreResult<Vec<String>> {
    let count = *counts.get(&class).ok_or(CoreError::ClassNotConfigured(class))?;
    let offset: u32 = counts
        .iter()
        .filter(|(c, _)| **c < class)
        .map(|(_, n)| *n)
        .sum();

    Ok((offset..offset + count).map(seat_code_at).collect())
}

/// Seat code of the n-th seat (zero-based) in cabin order.
fn seat_code_at(index: u32) -> String {
    let row = index / ROW_WIDTH + 1;
    let column = COLUMNS[(index % ROW_WIDTH) as usize];
    format!("{}{}", column, row)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatSlot {
    pub code: String,
    pub seat_class: SeatClass,
}

/// Whole cabin of a seat plan, partitioned by class
#[derive(Debug, Clone)]
pub struct SeatLayout {
    slots: Vec<SeatSlot>,
}

impl SeatLayout {
    pub fn from_plan(plan: &SeatPlan) -> Self {
        let mut slots = Vec::new();
        for class in plan.seats.keys() {
            // Keys come from the map itself, so generation cannot miss.
            if let Ok(codes) = generate(&plan.seats, *class) {
                slots.extend(codes.into_iter().map(|code| SeatSlot {
                    code,
                    seat_class: *class,
                }));
            }
        }
        Self { slots }
    }

    pub fn slots(&self) -> &[SeatSlot] {
        &self.slots
    }

    pub fn class_of(&self, code: &str) -> Option<SeatClass> {
        self.slots
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.seat_class)
    }

    pub fn codes_for(&self, class: SeatClass) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(move |s| s.seat_class == class)
            .map(|s| s.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
