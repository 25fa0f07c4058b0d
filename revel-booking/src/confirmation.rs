//! Booking confirmation.
//!
//! The flow behind `POST /v1/bookings/{id}/confirm`: gate the request,
//! verify the claimed payment with the provider, then record the status
//! flip, the availability decrements and the two queued emails as a single
//! transaction. Every rejection before the commit leaves the booking
//! PENDING and the inventory untouched, so the client can fix the problem
//! and retry the same call.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use revel_catalog::{ItemKey, ReserveOutcome};
use revel_core::{Caller, PaymentFacts};
use revel_shared::redact_email;
use uuid::Uuid;

use crate::models::{AccessCheck, Booking, BookingItem, BookingStatus, NotificationSchedule};
use crate::notifications::NotificationPlanner;
use crate::reference::ReferenceGenerator;
use crate::store::{BookingStore, BookingWithItems, StoreError, StoreTx};
use crate::verifier::{PaymentVerifier, PaymentVerifyError};

/// How many candidate references to try before giving up on the request.
pub const DEFAULT_REFERENCE_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("booking belongs to a different account")]
    AccessDenied,

    #[error("booking not found")]
    NotFound,

    /// The booking was already confirmed, whether long ago or by a
    /// concurrent request a moment ago. Carries the reference so callers
    /// can treat the retry as a replay rather than a failure.
    #[error("booking already confirmed with reference {reference}")]
    AlreadyConfirmed { reference: String },

    #[error("booking is {}", .status.as_str())]
    InvalidState { status: BookingStatus },

    #[error("booking has no items")]
    EmptyBooking,

    #[error(transparent)]
    Payment(#[from] PaymentVerifyError),

    #[error(
        "insufficient availability for {item} on {date}: requested {requested}, available {available}"
    )]
    InsufficientAvailability {
        item: ItemKey,
        date: NaiveDate,
        requested: i32,
        available: i32,
    },

    #[error("could not allocate an unused booking reference")]
    ReferenceCollisionExhausted,

    /// The charge was verified but the transaction failed, so nothing was
    /// persisted while the customer's money is captured. The booking is
    /// still PENDING and the same call can be retried.
    #[error("confirmation could not be recorded after payment was verified; retry")]
    PostPaymentCommitFailure {
        payment_reference: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a successful confirmation produced.
#[derive(Debug, Clone)]
pub struct ConfirmedBooking {
    pub booking: Booking,
    pub items: Vec<BookingItem>,
    pub payment: PaymentFacts,
    pub notifications: NotificationSchedule,
}

pub struct ConfirmationOrchestrator {
    store: Arc<dyn BookingStore>,
    verifier: PaymentVerifier,
    references: Arc<dyn ReferenceGenerator>,
    planner: NotificationPlanner,
    max_reference_attempts: u32,
}

impl ConfirmationOrchestrator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        verifier: PaymentVerifier,
        references: Arc<dyn ReferenceGenerator>,
        planner: NotificationPlanner,
    ) -> Self {
        Self {
            store,
            verifier,
            references,
            planner,
            max_reference_attempts: DEFAULT_REFERENCE_ATTEMPTS,
        }
    }

    /// Override how many candidate references are tried before giving up
    /// (`booking_rules.reference_max_attempts`).
    pub fn with_reference_attempts(mut self, attempts: u32) -> Self {
        self.max_reference_attempts = attempts;
        self
    }

    /// Notification schedule for a booking confirmed by an earlier call,
    /// rebuilt when a repeat confirm replays as success.
    pub fn replayed_schedule(&self, booking: &Booking) -> NotificationSchedule {
        self.planner.schedule_for_confirmed(booking)
    }

    pub async fn confirm(
        &self,
        booking_id: Uuid,
        payment_reference: &str,
        caller: &Caller,
    ) -> Result<ConfirmedBooking, ConfirmError> {
        // 1. Load the booking and gate the request before touching the
        //    provider. Existence is checked before ownership on purpose: a
        //    missing id is NotFound for every caller.
        let loaded = self
            .store
            .find_booking_with_items(booking_id)
            .await?
            .ok_or(ConfirmError::NotFound)?;

        match loaded.booking.accessible_by(caller) {
            AccessCheck::Granted => {}
            AccessCheck::RequiresAuth => return Err(ConfirmError::Unauthenticated),
            AccessCheck::Denied => return Err(ConfirmError::AccessDenied),
        }

        match loaded.booking.status {
            BookingStatus::Pending => {}
            BookingStatus::Confirmed => {
                return Err(ConfirmError::AlreadyConfirmed {
                    reference: loaded.booking.booking_reference.clone().unwrap_or_default(),
                })
            }
            status => return Err(ConfirmError::InvalidState { status }),
        }

        if loaded.items.is_empty() {
            return Err(ConfirmError::EmptyBooking);
        }

        let recipient = match loaded.recipient_email() {
            Some(email) => email.to_string(),
            None => {
                return Err(ConfirmError::Store(StoreError::Backend(format!(
                    "booking {booking_id} has no contact email"
                ))))
            }
        };
        tracing::debug!(
            booking_id = %booking_id,
            recipient = %redact_email(&recipient),
            "notification recipient resolved"
        );

        // 2. Verify the claimed payment: settled, exact amount, matching
        //    currency. Client-supplied amounts are never trusted.
        let payment = self
            .verifier
            .verify(
                payment_reference,
                loaded.booking.final_minor,
                &loaded.booking.currency,
            )
            .await?;

        // 3. Commit the confirmation as one transaction.
        self.commit_confirmed(loaded, payment, payment_reference, recipient)
            .await
    }

    /// The transactional tail of the flow. Storage failures in here are
    /// reported as `PostPaymentCommitFailure` because the charge has
    /// already been verified.
    async fn commit_confirmed(
        &self,
        loaded: BookingWithItems,
        payment: PaymentFacts,
        payment_reference: &str,
        recipient: String,
    ) -> Result<ConfirmedBooking, ConfirmError> {
        let booking_id = loaded.booking.id;
        let fail = |source: StoreError| {
            tracing::error!(
                booking_id = %booking_id,
                payment_reference,
                error = %source,
                "storage failed after payment verification; booking left PENDING, charge stands"
            );
            ConfirmError::PostPaymentCommitFailure {
                payment_reference: payment_reference.to_string(),
                source,
            }
        };

        let mut tx = self.store.begin().await.map_err(&fail)?;

        // Re-read under the row lock; a concurrent confirm or cancel may
        // have won the race since the gate above.
        let Some(current) = tx.lock_booking(booking_id).await.map_err(&fail)? else {
            return Err(ConfirmError::NotFound);
        };
        match current.status {
            BookingStatus::Pending => {}
            BookingStatus::Confirmed => {
                return Err(ConfirmError::AlreadyConfirmed {
                    reference: current.booking_reference.clone().unwrap_or_default(),
                })
            }
            status => return Err(ConfirmError::InvalidState { status }),
        }

        // Keep a reference the row already carries, otherwise allocate one.
        let reference = match current.booking_reference.as_deref() {
            Some(existing) if !existing.is_empty() => existing.to_string(),
            _ => self
                .allocate_reference(tx.as_mut())
                .await
                .map_err(&fail)?
                .ok_or(ConfirmError::ReferenceCollisionExhausted)?,
        };

        // Reserve inventory for every line on the booking date. Any
        // shortfall abandons the transaction, which rolls back the
        // reservations already staged for earlier lines.
        for item in &loaded.items {
            let key = item.item_key();
            match tx
                .reserve_availability(&key, current.booking_date, item.quantity)
                .await
                .map_err(&fail)?
            {
                ReserveOutcome::Reserved { remaining } => {
                    tracing::debug!(item = %key, remaining, "availability reserved");
                }
                ReserveOutcome::Unconstrained => {
                    tracing::warn!(
                        item = %key,
                        date = %current.booking_date,
                        "no availability tracked for item, treating as unlimited"
                    );
                }
                ReserveOutcome::Insufficient { available } => {
                    return Err(ConfirmError::InsufficientAvailability {
                        item: key,
                        date: current.booking_date,
                        requested: item.quantity,
                        available,
                    });
                }
            }
        }

        tx.set_booking_confirmed(booking_id, &reference, payment_reference)
            .await
            .map_err(&fail)?;

        let now = Utc::now();
        let mut confirmed = current;
        confirmed.status = BookingStatus::Confirmed;
        confirmed.booking_reference = Some(reference.clone());
        confirmed.payment_reference = Some(payment_reference.to_string());
        confirmed.updated_at = now;

        let planned = self
            .planner
            .plan_confirmation(&confirmed, &loaded.items, &recipient, now);
        let notifications = planned.schedule();
        tx.enqueue_email(planned.confirmation).await.map_err(&fail)?;
        tx.enqueue_email(planned.reminder).await.map_err(&fail)?;

        tx.commit().await.map_err(&fail)?;

        tracing::info!(
            booking_id = %booking_id,
            reference = %reference,
            amount_minor = payment.amount_minor,
            "booking confirmed"
        );

        Ok(ConfirmedBooking {
            booking: confirmed,
            items: loaded.items,
            payment,
            notifications,
        })
    }

    async fn allocate_reference(
        &self,
        tx: &mut dyn StoreTx,
    ) -> Result<Option<String>, StoreError> {
        for attempt in 1..=self.max_reference_attempts {
            let candidate = self.references.generate();
            if !tx.reference_in_use(&candidate).await? {
                return Ok(Some(candidate));
            }
            tracing::warn!(attempt, "booking reference collision, regenerating");
        }
        Ok(None)
    }
}
