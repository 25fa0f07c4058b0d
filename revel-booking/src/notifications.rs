//! Plans the emails a booking flow enqueues.
//!
//! Entries carry a full snapshot of the booking at the moment the flow ran,
//! so the delivery worker renders from the queue row alone and later edits
//! to catalog names or prices never leak into an already-queued email.

use chrono::{DateTime, NaiveTime, Utc};
use revel_shared::format_minor;
use serde_json::json;

use crate::models::{Booking, BookingItem, EmailType, NewEmailQueueEntry, NotificationSchedule};

pub const DEFAULT_REMINDER_LEAD_HOURS: i64 = 24;

/// The two emails produced by a successful confirmation.
#[derive(Debug, Clone)]
pub struct PlannedNotifications {
    pub confirmation: NewEmailQueueEntry,
    pub reminder: NewEmailQueueEntry,
}

impl PlannedNotifications {
    pub fn schedule(&self) -> NotificationSchedule {
        NotificationSchedule {
            confirmation_scheduled_for: self.confirmation.scheduled_for,
            reminder_scheduled_for: self.reminder.scheduled_for,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotificationPlanner {
    reminder_lead_hours: i64,
}

impl NotificationPlanner {
    pub fn new(reminder_lead_hours: i64) -> Self {
        Self {
            reminder_lead_hours,
        }
    }

    /// Confirmation email due immediately, reminder due `reminder_lead_hours`
    /// before midnight UTC on the booking date. For bookings confirmed inside
    /// the lead window the reminder's due time is already past, which makes
    /// the delivery worker pick it up on its next sweep.
    pub fn plan_confirmation(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        recipient: &str,
        now: DateTime<Utc>,
    ) -> PlannedNotifications {
        let snapshot = booking_snapshot(booking, items);
        PlannedNotifications {
            confirmation: NewEmailQueueEntry {
                recipient: recipient.to_string(),
                email_type: EmailType::BookingConfirmation,
                content: snapshot.clone(),
                scheduled_for: now,
            },
            reminder: NewEmailQueueEntry {
                recipient: recipient.to_string(),
                email_type: EmailType::BookingReminder,
                content: snapshot,
                scheduled_for: self.reminder_time(booking),
            },
        }
    }

    /// Refund notice due immediately, with the refunded amount alongside the
    /// booking snapshot.
    pub fn plan_refund_notice(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        recipient: &str,
        refund_minor: i64,
        now: DateTime<Utc>,
    ) -> NewEmailQueueEntry {
        let mut snapshot = booking_snapshot(booking, items);
        if let Some(map) = snapshot.as_object_mut() {
            map.insert(
                "refund_amount".to_string(),
                json!(format_minor(refund_minor, &booking.currency)),
            );
        }
        NewEmailQueueEntry {
            recipient: recipient.to_string(),
            email_type: EmailType::RefundNotice,
            content: snapshot,
            scheduled_for: now,
        }
    }

    /// Schedule for a booking whose confirmation already went through. The
    /// confirmation email was due the moment the status flipped, which both
    /// stores record in `updated_at`; the reminder follows the usual lead.
    pub fn schedule_for_confirmed(&self, booking: &Booking) -> NotificationSchedule {
        NotificationSchedule {
            confirmation_scheduled_for: booking.updated_at,
            reminder_scheduled_for: self.reminder_time(booking),
        }
    }

    fn reminder_time(&self, booking: &Booking) -> DateTime<Utc> {
        let event_start = booking.booking_date.and_time(NaiveTime::MIN).and_utc();
        event_start - chrono::Duration::hours(self.reminder_lead_hours)
    }
}

fn booking_snapshot(booking: &Booking, items: &[BookingItem]) -> serde_json::Value {
    json!({
        "booking": {
            "id": booking.id,
            "reference": booking.booking_reference,
            "status": booking.status.as_str(),
            "date": booking.booking_date,
            "currency": booking.currency,
            "total": format_minor(booking.total_minor, &booking.currency),
            "discount": format_minor(booking.discount_minor, &booking.currency),
            "amount_due": format_minor(booking.final_minor, &booking.currency),
        },
        "items": items
            .iter()
            .map(|item| {
                json!({
                    "name": item.name,
                    "type": item.item_type.as_str(),
                    "quantity": item.quantity,
                    "unit_price": format_minor(item.unit_price_minor, &booking.currency),
                    "total_price": format_minor(item.total_price_minor, &booking.currency),
                })
            })
            .collect::<Vec<_>>(),
    })
}
