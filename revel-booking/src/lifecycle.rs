//! Admin lifecycle actions that do not involve the payment provider.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};
use crate::store::{BookingStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("booking not found")]
    NotFound,

    #[error("only PENDING bookings can be cancelled (booking is {})", .status.as_str())]
    InvalidState { status: BookingStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct BookingLifecycle {
    store: Arc<dyn BookingStore>,
}

impl BookingLifecycle {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Cancel a PENDING booking. Nothing to release or refund: pending
    /// bookings hold no inventory and no verified payment. The row lock
    /// keeps a racing confirmation from slipping through mid-cancel.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking, CancelError> {
        let mut tx = self.store.begin().await?;
        let Some(current) = tx.lock_booking(booking_id).await? else {
            return Err(CancelError::NotFound);
        };
        if !current.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(CancelError::InvalidState {
                status: current.status,
            });
        }
        tx.set_booking_cancelled(booking_id).await?;
        tx.commit().await?;

        tracing::info!(booking_id = %booking_id, "booking cancelled");

        let mut cancelled = current;
        cancelled.status = BookingStatus::Cancelled;
        cancelled.updated_at = Utc::now();
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::NaiveDate;

    fn pending_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            booking_reference: None,
            status: BookingStatus::Pending,
            booking_date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            total_minor: 15000,
            discount_minor: 0,
            final_minor: 15000,
            currency: "GBP".to_string(),
            user_id: None,
            guest_name: Some("Jo Guest".to_string()),
            guest_email: Some("jo@example.org".to_string()),
            payment_reference: None,
            refunded_minor: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn cancels_a_pending_booking() {
        let store = Arc::new(MemoryStore::new());
        let booking = pending_booking();
        store.insert_booking(booking.clone(), Vec::new()).await;

        let cancelled = BookingLifecycle::new(store.clone())
            .cancel(booking.id)
            .await
            .unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(
            store.booking(booking.id).await.unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancelling_twice_reports_the_terminal_state() {
        let store = Arc::new(MemoryStore::new());
        let booking = pending_booking();
        store.insert_booking(booking.clone(), Vec::new()).await;
        let lifecycle = BookingLifecycle::new(store);

        lifecycle.cancel(booking.id).await.unwrap();
        let err = lifecycle.cancel(booking.id).await.unwrap_err();
        assert!(matches!(
            err,
            CancelError::InvalidState {
                status: BookingStatus::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn confirmed_bookings_are_not_cancellable() {
        let store = Arc::new(MemoryStore::new());
        let mut booking = pending_booking();
        booking.status = BookingStatus::Confirmed;
        store.insert_booking(booking.clone(), Vec::new()).await;

        let err = BookingLifecycle::new(store)
            .cancel(booking.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CancelError::InvalidState {
                status: BookingStatus::Confirmed
            }
        ));
    }

    #[tokio::test]
    async fn missing_booking_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = BookingLifecycle::new(store)
            .cancel(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CancelError::NotFound));
    }
}
