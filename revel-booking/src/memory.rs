//! In-memory `BookingStore` used by tests and the local development profile.
//!
//! Transactions clone the committed state, stage writes against the clone,
//! and swap it back on commit while holding the store mutex for the whole
//! transaction. That gives the same observable behavior as the database:
//! concurrent transactions serialize, and a dropped transaction leaves no
//! trace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use revel_catalog::{
    AvailabilityEntry, AvailabilityLedger, Extra, ItemKey, Package, ReserveOutcome,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{
    Booking, BookingItem, BookingStatus, EmailQueueEntry, EmailStatus, NewEmailQueueEntry,
};
use crate::store::{BookingFilter, BookingStore, BookingWithItems, StoreError, StoreTx};

#[derive(Clone, Default)]
struct MemoryInner {
    bookings: HashMap<Uuid, Booking>,
    items: HashMap<Uuid, Vec<BookingItem>>,
    users: HashMap<Uuid, String>,
    packages: HashMap<Uuid, Package>,
    extras: HashMap<Uuid, Extra>,
    ledger: AvailabilityLedger,
    emails: Vec<EmailQueueEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, id: Uuid, email: &str) {
        self.inner.lock().await.users.insert(id, email.to_string());
    }

    pub async fn seed_package(&self, package: Package) {
        self.inner.lock().await.packages.insert(package.id, package);
    }

    pub async fn seed_extra(&self, extra: Extra) {
        self.inner.lock().await.extras.insert(extra.id, extra);
    }

    pub async fn seed_availability(&self, item: ItemKey, date: NaiveDate, total_quantity: i32) {
        self.inner
            .lock()
            .await
            .ledger
            .initialize(item, date, total_quantity);
    }

    /// Insert a booking directly, bypassing checkout. Test setup only.
    pub async fn insert_booking(&self, booking: Booking, items: Vec<BookingItem>) {
        let mut inner = self.inner.lock().await;
        inner.items.insert(booking.id, items);
        inner.bookings.insert(booking.id, booking);
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.inner.lock().await.bookings.get(&id).cloned()
    }

    pub async fn available_quantity(&self, item: &ItemKey, date: NaiveDate) -> Option<i32> {
        self.inner
            .lock()
            .await
            .ledger
            .get(item, date)
            .map(|e| e.available_quantity)
    }

    pub async fn emails(&self) -> Vec<EmailQueueEntry> {
        self.inner.lock().await.emails.clone()
    }

    /// Arm the next `commit` call to fail, simulating a storage outage at
    /// the worst possible moment.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_booking_with_items(
        &self,
        id: Uuid,
    ) -> Result<Option<BookingWithItems>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(booking) = inner.bookings.get(&id).cloned() else {
            return Ok(None);
        };
        let items = inner.items.get(&id).cloned().unwrap_or_default();
        let owner_email = booking
            .user_id
            .and_then(|uid| inner.users.get(&uid).cloned());
        Ok(Some(BookingWithItems {
            booking,
            items,
            owner_email,
        }))
    }

    async fn create_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.bookings.contains_key(&booking.id) {
            return Err(StoreError::Backend(format!(
                "duplicate booking id {}",
                booking.id
            )));
        }
        inner.items.insert(booking.id, items.to_vec());
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_package(&self, id: Uuid) -> Result<Option<Package>, StoreError> {
        Ok(self.inner.lock().await.packages.get(&id).cloned())
    }

    async fn find_extra(&self, id: Uuid) -> Result<Option<Extra>, StoreError> {
        Ok(self.inner.lock().await.extras.get(&id).cloned())
    }

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityEntry>, StoreError> {
        Ok(self.inner.lock().await.ledger.entries_for_date(date))
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| filter.booking_date.is_none_or(|d| b.booking_date == d))
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.inner.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            fail_flag: self.fail_next_commit.clone(),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryInner>,
    work: MemoryInner,
    fail_flag: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.work.bookings.get(&id).cloned())
    }

    async fn reference_in_use(&mut self, code: &str) -> Result<bool, StoreError> {
        Ok(self
            .work
            .bookings
            .values()
            .any(|b| b.booking_reference.as_deref() == Some(code)))
    }

    async fn set_booking_confirmed(
        &mut self,
        id: Uuid,
        reference: &str,
        payment_reference: &str,
    ) -> Result<(), StoreError> {
        let booking = self
            .work
            .bookings
            .get_mut(&id)
            .filter(|b| b.status == BookingStatus::Pending)
            .ok_or_else(|| {
                StoreError::Backend(format!("booking {id} not PENDING at confirmation write"))
            })?;
        booking.status = BookingStatus::Confirmed;
        booking.booking_reference = Some(reference.to_string());
        booking.payment_reference = Some(payment_reference.to_string());
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn set_booking_cancelled(&mut self, id: Uuid) -> Result<(), StoreError> {
        let booking = self
            .work
            .bookings
            .get_mut(&id)
            .filter(|b| b.status == BookingStatus::Pending)
            .ok_or_else(|| {
                StoreError::Backend(format!("booking {id} not PENDING at cancellation write"))
            })?;
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn set_booking_refunded(
        &mut self,
        id: Uuid,
        amount_minor: i64,
        refunded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let booking = self
            .work
            .bookings
            .get_mut(&id)
            .filter(|b| b.status == BookingStatus::Confirmed)
            .ok_or_else(|| {
                StoreError::Backend(format!("booking {id} not CONFIRMED at refund write"))
            })?;
        booking.status = BookingStatus::Refunded;
        booking.refunded_minor = Some(amount_minor);
        booking.refunded_at = Some(refunded_at);
        booking.updated_at = refunded_at;
        Ok(())
    }

    async fn reserve_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<ReserveOutcome, StoreError> {
        self.work
            .ledger
            .reserve(item, date, quantity)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn release_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<Option<i32>, StoreError> {
        self.work
            .ledger
            .release(item, date, quantity)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn enqueue_email(&mut self, entry: NewEmailQueueEntry) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.work.emails.push(EmailQueueEntry {
            id,
            recipient: entry.recipient,
            email_type: entry.email_type,
            content: entry.content,
            scheduled_for: entry.scheduled_for,
            status: EmailStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard,
            work,
            fail_flag,
        } = *self;
        if fail_flag.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated commit failure".to_string()));
        }
        *guard = work;
        Ok(())
    }
}
