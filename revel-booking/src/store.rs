//! Storage seam for the booking service.
//!
//! `BookingStore` covers plain reads and booking creation; `StoreTx` is a
//! single open transaction. Dropping a `StoreTx` without calling `commit`
//! rolls every staged write back, which is what the confirmation and refund
//! flows rely on when they bail out partway through.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use revel_catalog::{AvailabilityEntry, Extra, ItemKey, Package, ReserveOutcome};
use uuid::Uuid;

use crate::models::{Booking, BookingItem, BookingStatus, NewEmailQueueEntry};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// A booking together with its lines and, for account bookings, the owner's
/// email as resolved at load time.
#[derive(Debug, Clone)]
pub struct BookingWithItems {
    pub booking: Booking,
    pub items: Vec<BookingItem>,
    /// Registered owner's email. `None` for guest bookings and for
    /// aggregates that were built rather than loaded.
    pub owner_email: Option<String>,
}

impl BookingWithItems {
    /// Address confirmation and refund emails go to: the account email for
    /// account bookings, the guest email otherwise.
    pub fn recipient_email(&self) -> Option<&str> {
        if self.booking.is_guest_booking() {
            self.booking.guest_email.as_deref()
        } else {
            self.owner_email.as_deref()
        }
    }
}

/// Filters for the admin booking list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub booking_date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_booking_with_items(
        &self,
        id: Uuid,
    ) -> Result<Option<BookingWithItems>, StoreError>;

    /// Persist a new booking and its lines atomically.
    async fn create_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
    ) -> Result<(), StoreError>;

    async fn find_package(&self, id: Uuid) -> Result<Option<Package>, StoreError>;

    async fn find_extra(&self, id: Uuid) -> Result<Option<Extra>, StoreError>;

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityEntry>, StoreError>;

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError>;

    /// Open a transaction for a status-changing flow.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open transaction. All writes land together on `commit`; anything
/// else (drop, error) discards them.
#[async_trait]
pub trait StoreTx: Send {
    /// Load the booking row with an exclusive row lock, so concurrent
    /// status changes on the same booking serialize behind this call.
    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Whether any booking already carries this reference code.
    async fn reference_in_use(&mut self, code: &str) -> Result<bool, StoreError>;

    /// Flip a locked PENDING booking to CONFIRMED, stamping the reference
    /// and the verified payment. Errors if the row is gone or not PENDING,
    /// which cannot happen while the caller holds the row lock.
    async fn set_booking_confirmed(
        &mut self,
        id: Uuid,
        reference: &str,
        payment_reference: &str,
    ) -> Result<(), StoreError>;

    async fn set_booking_cancelled(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn set_booking_refunded(
        &mut self,
        id: Uuid,
        amount_minor: i64,
        refunded_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Atomically take `quantity` units of the item on `date`. Never
    /// drives the tracked quantity below zero; an item with no
    /// availability row reports `Unconstrained` and reserves nothing.
    async fn reserve_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<ReserveOutcome, StoreError>;

    /// Return `quantity` units, clamped at the configured total. Reports
    /// the new available quantity, or `None` when no row tracks the item.
    async fn release_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<Option<i32>, StoreError>;

    async fn enqueue_email(&mut self, entry: NewEmailQueueEntry) -> Result<Uuid, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
