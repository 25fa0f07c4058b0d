use crate::items::ItemKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-(item, date) capacity counter.
///
/// Rows are seeded by capacity planning; confirmation decrements, refunds
/// restock. `0 <= available_quantity <= total_quantity` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    pub item: ItemKey,
    pub date: NaiveDate,
    pub total_quantity: i32,
    pub available_quantity: i32,
}

/// Result of one reservation attempt against a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The counter existed and was decremented.
    Reserved { remaining: i32 },
    /// No counter exists for this (item, date): treated as unlimited.
    Unconstrained,
    /// The counter exists but cannot cover the requested quantity. Nothing
    /// was decremented.
    Insufficient { available: i32 },
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("reservation quantity must be positive, got {0}")]
    InvalidQuantity(i32),
}

/// In-memory availability ledger. Backs the fake store used in tests; the
/// Postgres store implements the same semantics with conditional updates.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityLedger {
    entries: HashMap<(ItemKey, NaiveDate), AvailabilityEntry>,
}

impl AvailabilityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed capacity for an item on a date.
    pub fn initialize(&mut self, item: ItemKey, date: NaiveDate, total_quantity: i32) {
        self.entries.insert(
            (item, date),
            AvailabilityEntry {
                item,
                date,
                total_quantity,
                available_quantity: total_quantity,
            },
        );
    }

    pub fn get(&self, item: &ItemKey, date: NaiveDate) -> Option<&AvailabilityEntry> {
        self.entries.get(&(*item, date))
    }

    /// All entries for one calendar date, for the date-picker surface.
    pub fn entries_for_date(&self, date: NaiveDate) -> Vec<AvailabilityEntry> {
        let mut entries: Vec<AvailabilityEntry> = self
            .entries
            .values()
            .filter(|e| e.date == date)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.item.item_type.as_str(), e.item.item_id));
        entries
    }

    /// Decrement `quantity` from the entry, refusing to go below zero.
    /// An absent entry reserves nothing and constrains nothing.
    pub fn reserve(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<ReserveOutcome, AvailabilityError> {
        if quantity <= 0 {
            return Err(AvailabilityError::InvalidQuantity(quantity));
        }

        let Some(entry) = self.entries.get_mut(&(*item, date)) else {
            return Ok(ReserveOutcome::Unconstrained);
        };

        if entry.available_quantity < quantity {
            return Ok(ReserveOutcome::Insufficient {
                available: entry.available_quantity,
            });
        }

        entry.available_quantity -= quantity;
        Ok(ReserveOutcome::Reserved {
            remaining: entry.available_quantity,
        })
    }

    /// Restock `quantity`, clamped at `total_quantity`. Returns the new
    /// availability, or `None` when no entry exists for this (item, date).
    pub fn release(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<Option<i32>, AvailabilityError> {
        if quantity <= 0 {
            return Err(AvailabilityError::InvalidQuantity(quantity));
        }

        let Some(entry) = self.entries.get_mut(&(*item, date)) else {
            return Ok(None);
        };

        entry.available_quantity =
            entry.total_quantity.min(entry.available_quantity + quantity);
        Ok(Some(entry.available_quantity))
    }
}
