//! Core booking types shared by the checkout, confirmation and refund flows.

use chrono::{DateTime, NaiveDate, Utc};
use revel_catalog::{ItemKey, ItemType};
use revel_core::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a booking. Stored as upper snake case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    /// Allowed forward transitions. Terminal states admit none.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Refunded)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REFUNDED" => Ok(BookingStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown booking status: {0}")]
pub struct UnknownStatus(pub String);

/// Outcome of checking a caller against the booking's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    Granted,
    /// The booking belongs to a registered account and the caller is anonymous.
    RequiresAuth,
    Denied,
}

/// A booking row. Monetary amounts are minor units of `currency`.
///
/// Exactly one of `user_id` or the guest fields identifies the owner.
/// `booking_reference` stays empty until confirmation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: Option<String>,
    pub status: BookingStatus,
    pub booking_date: NaiveDate,
    pub total_minor: i64,
    pub discount_minor: i64,
    pub final_minor: i64,
    pub currency: String,
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub payment_reference: Option<String>,
    pub refunded_minor: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_guest_booking(&self) -> bool {
        self.user_id.is_none()
    }

    /// Ownership gate. Guest bookings are actionable only over the anonymous
    /// guest channel; account bookings only by the owning user.
    pub fn accessible_by(&self, caller: &Caller) -> AccessCheck {
        match (self.user_id, caller) {
            (Some(owner), Caller::User(id)) if owner == *id => AccessCheck::Granted,
            (Some(_), Caller::User(_)) => AccessCheck::Denied,
            (Some(_), Caller::Guest) => AccessCheck::RequiresAuth,
            (None, Caller::Guest) => AccessCheck::Granted,
            (None, Caller::User(_)) => AccessCheck::Denied,
        }
    }
}

/// A line within a booking. `total_price_minor` is always
/// `unit_price_minor * quantity`; prices are copied from the catalog at
/// creation time and never re-read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub total_price_minor: i64,
}

impl BookingItem {
    pub fn new(
        booking_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
        name: impl Into<String>,
        quantity: i32,
        unit_price_minor: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            item_type,
            item_id,
            name: name.into(),
            quantity,
            unit_price_minor,
            total_price_minor: unit_price_minor * i64::from(quantity),
        }
    }

    pub fn item_key(&self) -> ItemKey {
        ItemKey {
            item_type: self.item_type,
            item_id: self.item_id,
        }
    }
}

/// Kinds of outbound email the platform enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailType {
    BookingConfirmation,
    BookingReminder,
    RefundNotice,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::BookingConfirmation => "BOOKING_CONFIRMATION",
            EmailType::BookingReminder => "BOOKING_REMINDER",
            EmailType::RefundNotice => "REFUND_NOTICE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "PENDING",
            EmailStatus::Sent => "SENT",
            EmailStatus::Failed => "FAILED",
        }
    }
}

/// An email waiting in the outbound queue. A separate delivery worker owns
/// the `status` column; this service only ever inserts `PENDING` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailQueueEntry {
    pub id: Uuid,
    pub recipient: String,
    pub email_type: EmailType,
    pub content: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
    pub status: EmailStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert form for the email queue. Id, status and created_at are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewEmailQueueEntry {
    pub recipient: String,
    pub email_type: EmailType,
    pub content: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
}

/// When the two post-confirmation emails will go out.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NotificationSchedule {
    pub confirmation_scheduled_for: DateTime<Utc>,
    pub reminder_scheduled_for: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_owned_by(user_id: Option<Uuid>) -> Booking {
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
            user_id,
            guest_name: user_id.is_none().then(|| "Jo Guest".to_string()),
            guest_email: user_id.is_none().then(|| "jo@example.org".to_string()),
            payment_reference: None,
            refunded_minor: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_can_access_their_booking() {
        let owner = Uuid::new_v4();
        let booking = booking_owned_by(Some(owner));
        assert_eq!(booking.accessible_by(&Caller::User(owner)), AccessCheck::Granted);
    }

    #[test]
    fn anonymous_caller_on_account_booking_needs_auth() {
        let booking = booking_owned_by(Some(Uuid::new_v4()));
        assert_eq!(booking.accessible_by(&Caller::Guest), AccessCheck::RequiresAuth);
    }

    #[test]
    fn wrong_user_is_denied() {
        let booking = booking_owned_by(Some(Uuid::new_v4()));
        assert_eq!(
            booking.accessible_by(&Caller::User(Uuid::new_v4())),
            AccessCheck::Denied
        );
    }

    #[test]
    fn guest_booking_is_guest_channel_only() {
        let booking = booking_owned_by(None);
        assert_eq!(booking.accessible_by(&Caller::Guest), AccessCheck::Granted);
        assert_eq!(
            booking.accessible_by(&Caller::User(Uuid::new_v4())),
            AccessCheck::Denied
        );
    }

    #[test]
    fn transition_matrix() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Refunded));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Refunded.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Refunded));
    }

    #[test]
    fn item_total_is_unit_times_quantity() {
        let item = BookingItem::new(
            Uuid::new_v4(),
            ItemType::Package,
            Uuid::new_v4(),
            "Gold Package",
            3,
            2500,
        );
        assert_eq!(item.total_price_minor, 7500);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("DRAFT".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn status_serializes_upper_snake() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
    }
}
