//! Checkout: build and price a PENDING booking from a client's selection.
//!
//! Prices always come from the catalog at creation time. The client sends
//! item ids and quantities, nothing more, and the totals it will later be
//! charged against are computed and stored here.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use revel_catalog::{ItemKey, ItemType, PricedItem};
use revel_core::Caller;
use uuid::Uuid;

use crate::models::{Booking, BookingItem, BookingStatus};
use crate::store::{BookingStore, BookingWithItems, StoreError};

#[derive(Debug, Clone)]
pub struct ItemSelection {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct GuestDetails {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub booking_date: NaiveDate,
    pub items: Vec<ItemSelection>,
    /// Present on anonymous checkouts only.
    pub guest: Option<GuestDetails>,
    pub discount_minor: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("booking must contain at least one item")]
    EmptyItems,

    #[error("quantity must be positive for {item}")]
    InvalidQuantity { item: ItemKey },

    #[error("unknown or inactive item {item}")]
    UnknownItem { item: ItemKey },

    #[error("booking date {0} is in the past")]
    DateInPast(NaiveDate),

    #[error("discount must be between zero and the booking total")]
    InvalidDiscount,

    #[error("guest name and email are required for guest checkout")]
    MissingGuestDetails,

    #[error("guest details are not accepted on an account checkout")]
    AmbiguousIdentity,

    #[error("guest email looks invalid")]
    InvalidGuestEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CheckoutService {
    store: Arc<dyn BookingStore>,
    currency: String,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn BookingStore>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    pub async fn create(
        &self,
        request: CreateBookingRequest,
        caller: &Caller,
    ) -> Result<BookingWithItems, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyItems);
        }
        if request.booking_date < Utc::now().date_naive() {
            return Err(CheckoutError::DateInPast(request.booking_date));
        }

        // Exactly one owner: the authenticated account, or the guest details.
        let (user_id, guest_name, guest_email) = match (caller, request.guest) {
            (Caller::User(id), None) => (Some(*id), None, None),
            (Caller::User(_), Some(_)) => return Err(CheckoutError::AmbiguousIdentity),
            (Caller::Guest, Some(guest)) => {
                let name = guest.name.trim().to_string();
                let email = guest.email.trim().to_string();
                if name.is_empty() || email.is_empty() {
                    return Err(CheckoutError::MissingGuestDetails);
                }
                if !email.contains('@') {
                    return Err(CheckoutError::InvalidGuestEmail);
                }
                (None, Some(name), Some(email))
            }
            (Caller::Guest, None) => return Err(CheckoutError::MissingGuestDetails),
        };

        let booking_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(request.items.len());
        let mut total_minor = 0i64;
        for selection in &request.items {
            let key = ItemKey {
                item_type: selection.item_type,
                item_id: selection.item_id,
            };
            if selection.quantity <= 0 {
                return Err(CheckoutError::InvalidQuantity { item: key });
            }
            let priced = self
                .lookup(&key)
                .await?
                .filter(|p| p.is_active)
                .ok_or(CheckoutError::UnknownItem { item: key })?;
            let item = BookingItem::new(
                booking_id,
                key.item_type,
                key.item_id,
                priced.name,
                selection.quantity,
                priced.price_minor,
            );
            total_minor += item.total_price_minor;
            items.push(item);
        }

        if request.discount_minor < 0 || request.discount_minor > total_minor {
            return Err(CheckoutError::InvalidDiscount);
        }
        let final_minor = total_minor - request.discount_minor;

        let now = Utc::now();
        let booking = Booking {
            id: booking_id,
            booking_reference: None,
            status: BookingStatus::Pending,
            booking_date: request.booking_date,
            total_minor,
            discount_minor: request.discount_minor,
            final_minor,
            currency: self.currency.clone(),
            user_id,
            guest_name,
            guest_email,
            payment_reference: None,
            refunded_minor: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.create_booking(&booking, &items).await?;
        tracing::info!(
            booking_id = %booking.id,
            lines = items.len(),
            total_minor,
            final_minor,
            "booking created"
        );

        Ok(BookingWithItems {
            booking,
            items,
            owner_email: None,
        })
    }

    async fn lookup(&self, key: &ItemKey) -> Result<Option<PricedItem>, StoreError> {
        Ok(match key.item_type {
            ItemType::Package => self
                .store
                .find_package(key.item_id)
                .await?
                .map(|p| PricedItem::from(&p)),
            ItemType::Extra => self
                .store
                .find_extra(key.item_id)
                .await?
                .map(|e| PricedItem::from(&e)),
        })
    }
}
