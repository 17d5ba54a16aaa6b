//! # Weight Totals
//!
//! Gross/tare/net computation over a transaction's weighing legs.
//!
//! The heavier leg is the gross weight, the lighter one the tare, and the
//! net load is their difference. Works over the fixed two-leg slots of a
//! transaction but accepts any ordered slice, so a single-leg (open)
//! transaction yields gross = tare and a zero net.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Leg;

/// A weight with the moment it was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightStamp {
    pub value: i64,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Receipt-level totals derived from the populated legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightTotals {
    pub gross: WeightStamp,
    pub tare: WeightStamp,
    pub net: i64,
}

impl WeightTotals {
    fn zero() -> Self {
        let empty = WeightStamp {
            value: 0,
            captured_at: None,
        };
        WeightTotals {
            gross: empty,
            tare: empty,
            net: 0,
        }
    }
}

/// Computes gross/tare/net over the populated legs, in slot order.
///
/// Unpopulated slots (no leg type) are skipped; all-empty input yields
/// all-zero totals.
pub fn compute_totals(legs: &[&Leg]) -> WeightTotals {
    let populated: Vec<&Leg> = legs.iter().copied().filter(|l| l.is_populated()).collect();

    let Some(first) = populated.first() else {
        return WeightTotals::zero();
    };

    let mut gross = *first;
    let mut tare = *first;
    for &leg in &populated {
        if leg.value > gross.value {
            gross = leg;
        }
        if leg.value < tare.value {
            tare = leg;
        }
    }

    WeightTotals {
        gross: WeightStamp {
            value: gross.value,
            captured_at: gross.captured_at,
        },
        tare: WeightStamp {
            value: tare.value,
            captured_at: tare.captured_at,
        },
        net: gross.value - tare.value,
    }
}
