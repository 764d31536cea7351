//! Pure in-memory view of a batch plus its child rows.
//!
//! All derived quantities are recomputed from the loaded rows on every call.
//! Nothing here performs I/O; callers decide whether the rows were read
//! under a lock (mutation paths) or not (read paths).

use crate::entities::{batch, batch_reservation, consumption_record};

/// A batch row together with its consumption and reservation rows.
pub struct BatchLedger<'a> {
    batch: &'a batch::Model,
    consumptions: &'a [consumption_record::Model],
    reservations: &'a [batch_reservation::Model],
}

impl<'a> BatchLedger<'a> {
    pub fn new(
        batch: &'a batch::Model,
        consumptions: &'a [consumption_record::Model],
        reservations: &'a [batch_reservation::Model],
    ) -> Self {
        Self {
            batch,
            consumptions,
            reservations,
        }
    }

    /// Total volume minus everything consumed, clamped at zero.
    pub fn available_liters(&self) -> f64 {
        let consumed: f64 = self.consumptions.iter().map(|r| r.qty).sum();
        (self.batch.volume_liters - consumed).max(0.0)
    }

    /// Sum of active (unreleased) reservations.
    pub fn reserved_liters(&self) -> f64 {
        self.reservations
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.reserved_qty)
            .sum()
    }

    /// Available volume not yet promised to a reservation, clamped at zero.
    pub fn free_liters(&self) -> f64 {
        (self.available_liters() - self.reserved_liters()).max(0.0)
    }

    pub fn is_expired(&self) -> bool {
        self.batch.is_expired()
    }

    pub fn is_deleted(&self) -> bool {
        self.batch.is_deleted()
    }
}
