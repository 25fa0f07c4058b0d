pub mod availability;
pub mod items;

pub use availability::{AvailabilityEntry, AvailabilityError, AvailabilityLedger, ReserveOutcome};
pub use items::{Extra, ItemKey, ItemType, Package, PricedItem};
