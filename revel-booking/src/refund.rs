//! Refunds against confirmed bookings.
//!
//! Mirrors the confirmation flow in reverse: issue the refund with the
//! provider first, then record the status flip, the restocked availability
//! and the customer notice as one transaction. The provider call sits
//! outside the transaction, so a storage failure after a successful refund
//! is reported loudly as `PostRefundCommitFailure` for manual follow-up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use revel_core::{GatewayError, PaymentGateway, RefundFacts, RefundStatus};
use uuid::Uuid;

use crate::models::{Booking, BookingItem, BookingStatus};
use crate::notifications::NotificationPlanner;
use crate::store::{BookingStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RefundError {
    #[error("booking not found")]
    NotFound,

    #[error("only CONFIRMED bookings can be refunded (booking is {})", .status.as_str())]
    InvalidState { status: BookingStatus },

    #[error("refund amount must be positive and at most {refundable_minor}")]
    InvalidAmount {
        requested_minor: i64,
        refundable_minor: i64,
    },

    #[error("booking has no payment reference on record")]
    MissingPaymentReference,

    #[error("provider has no record of the payment")]
    PaymentNotFound,

    #[error("provider rejected the refund")]
    RefundRejected,

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The provider issued the refund but the transaction failed, so the
    /// booking still reads CONFIRMED. Retrying blind would refund twice.
    #[error("refund issued but could not be recorded; manual follow-up required")]
    PostRefundCommitFailure {
        refund_reference: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct RefundedBooking {
    pub booking: Booking,
    pub items: Vec<BookingItem>,
    pub refund: RefundFacts,
}

pub struct RefundProcessor {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    planner: NotificationPlanner,
    timeout: Duration,
}

impl RefundProcessor {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        planner: NotificationPlanner,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            planner,
            timeout,
        }
    }

    /// Refund `amount_minor` (the full charge when `None`) and release the
    /// booking's inventory back to the date. Any refund, full or partial,
    /// moves the booking to REFUNDED and frees its slots.
    pub async fn refund(
        &self,
        booking_id: Uuid,
        amount_minor: Option<i64>,
    ) -> Result<RefundedBooking, RefundError> {
        // 1. Load and gate.
        let loaded = self
            .store
            .find_booking_with_items(booking_id)
            .await?
            .ok_or(RefundError::NotFound)?;
        if !loaded.booking.status.can_transition_to(BookingStatus::Refunded) {
            return Err(RefundError::InvalidState {
                status: loaded.booking.status,
            });
        }

        let refundable_minor = loaded.booking.final_minor;
        let amount = amount_minor.unwrap_or(refundable_minor);
        if amount <= 0 || amount > refundable_minor {
            return Err(RefundError::InvalidAmount {
                requested_minor: amount,
                refundable_minor,
            });
        }

        let payment_reference = loaded
            .booking
            .payment_reference
            .clone()
            .ok_or(RefundError::MissingPaymentReference)?;
        let recipient = loaded.recipient_email().map(str::to_string);

        // 2. Issue the refund with the provider.
        let refund = match tokio::time::timeout(
            self.timeout,
            self.gateway.refund_payment(&payment_reference, amount),
        )
        .await
        {
            Err(_) => {
                return Err(RefundError::GatewayUnavailable(format!(
                    "no response within {:?}",
                    self.timeout
                )))
            }
            Ok(Err(GatewayError::NotFound(_))) => return Err(RefundError::PaymentNotFound),
            Ok(Err(GatewayError::Unavailable(msg))) => {
                return Err(RefundError::GatewayUnavailable(msg))
            }
            Ok(Ok(refund)) => refund,
        };
        if refund.status == RefundStatus::Failed {
            return Err(RefundError::RefundRejected);
        }

        // 3. Record it.
        let fail = |source: StoreError| {
            tracing::error!(
                booking_id = %booking_id,
                refund_reference = %refund.reference,
                error = %source,
                "refund issued but storage failed; booking still reads CONFIRMED"
            );
            RefundError::PostRefundCommitFailure {
                refund_reference: refund.reference.clone(),
                source,
            }
        };

        let mut tx = self.store.begin().await.map_err(&fail)?;
        let Some(current) = tx.lock_booking(booking_id).await.map_err(&fail)? else {
            return Err(RefundError::NotFound);
        };
        if current.status != BookingStatus::Confirmed {
            return Err(RefundError::InvalidState {
                status: current.status,
            });
        }

        let now = Utc::now();
        tx.set_booking_refunded(booking_id, amount, now)
            .await
            .map_err(&fail)?;

        // Free the date's inventory, clamped at each pool's total.
        for item in &loaded.items {
            let key = item.item_key();
            match tx
                .release_availability(&key, current.booking_date, item.quantity)
                .await
                .map_err(&fail)?
            {
                Some(available) => {
                    tracing::debug!(item = %key, available, "availability released");
                }
                None => {
                    tracing::debug!(item = %key, "no availability tracked for item");
                }
            }
        }

        let mut refunded = current;
        refunded.status = BookingStatus::Refunded;
        refunded.refunded_minor = Some(amount);
        refunded.refunded_at = Some(now);
        refunded.updated_at = now;

        match &recipient {
            Some(email) => {
                let notice = self
                    .planner
                    .plan_refund_notice(&refunded, &loaded.items, email, amount, now);
                tx.enqueue_email(notice).await.map_err(&fail)?;
            }
            None => {
                tracing::warn!(booking_id = %booking_id, "no contact email on booking, skipping refund notice");
            }
        }

        tx.commit().await.map_err(&fail)?;

        tracing::info!(
            booking_id = %booking_id,
            refund_reference = %refund.reference,
            amount_minor = amount,
            "booking refunded"
        );

        Ok(RefundedBooking {
            booking: refunded,
            items: loaded.items,
            refund,
        })
    }
}
