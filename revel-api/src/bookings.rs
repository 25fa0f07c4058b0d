use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use revel_booking::{
    AccessCheck, Booking, BookingItem, BookingStatus, ConfirmError, CreateBookingRequest,
    GuestDetails, ItemSelection, NotificationSchedule, PaymentVerifyError,
};
use revel_catalog::ItemType;
use revel_core::{Caller, PaymentStatus};
use revel_shared::Masked;

use crate::error::ApiError;
use crate::middleware::caller_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ItemSelectionBody {
    item_type: ItemType,
    item_id: Uuid,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct GuestBody {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct CreateBookingBody {
    booking_date: NaiveDate,
    items: Vec<ItemSelectionBody>,
    guest: Option<GuestBody>,
    #[serde(default)]
    discount_minor: i64,
}

#[derive(Debug, Deserialize)]
struct ConfirmBookingBody {
    payment_reference: String,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    id: Uuid,
    booking_reference: Option<String>,
    status: String,
    booking_date: NaiveDate,
    total_minor: i64,
    discount_minor: i64,
    final_minor: i64,
    currency: String,
    guest_name: Option<Masked<String>>,
    guest_email: Option<Masked<String>>,
    payment_reference: Option<String>,
    items: Vec<BookingItemResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookingItemResponse {
    pub item_type: String,
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub total_price_minor: i64,
}

impl From<BookingItem> for BookingItemResponse {
    fn from(item: BookingItem) -> Self {
        Self {
            item_type: item.item_type.as_str().to_string(),
            item_id: item.item_id,
            name: item.name,
            quantity: item.quantity,
            unit_price_minor: item.unit_price_minor,
            total_price_minor: item.total_price_minor,
        }
    }
}

impl BookingResponse {
    fn from_parts(booking: Booking, items: Vec<BookingItem>) -> Self {
        Self {
            id: booking.id,
            booking_reference: booking.booking_reference,
            status: booking.status.as_str().to_string(),
            booking_date: booking.booking_date,
            total_minor: booking.total_minor,
            discount_minor: booking.discount_minor,
            final_minor: booking.final_minor,
            currency: booking.currency,
            guest_name: booking.guest_name.map(Masked),
            guest_email: booking.guest_email.map(Masked),
            payment_reference: booking.payment_reference,
            items: items.into_iter().map(BookingItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    booking: ConfirmedBookingBody,
    payment_confirmation: PaymentConfirmationBody,
    notifications: NotificationSchedule,
}

#[derive(Debug, Serialize)]
struct ConfirmedBookingBody {
    id: Uuid,
    booking_reference: String,
    status: String,
    booking_date: NaiveDate,
    final_minor: i64,
    currency: String,
    items: Vec<BookingItemResponse>,
}

#[derive(Debug, Serialize)]
struct PaymentConfirmationBody {
    reference: String,
    amount_minor: i64,
    currency: String,
    status: PaymentStatus,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .layer(axum::middleware::from_fn_with_state(
            state,
            caller_middleware,
        ))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let request = CreateBookingRequest {
        booking_date: body.booking_date,
        items: body
            .items
            .into_iter()
            .map(|item| ItemSelection {
                item_type: item.item_type,
                item_id: item.item_id,
                quantity: item.quantity,
            })
            .collect(),
        guest: body.guest.map(|guest| GuestDetails {
            name: guest.name,
            email: guest.email,
        }),
        discount_minor: body.discount_minor,
    };

    let created = state.checkout.create(request, &caller).await?;
    state.metrics.bookings_created.inc();

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_parts(created.booking, created.items)),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    // 1. Load the aggregate.
    let loaded = state
        .store
        .find_booking_with_items(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("booking not found".to_string()))?;

    // 2. Same ownership gate as the confirm flow.
    match loaded.booking.accessible_by(&caller) {
        AccessCheck::Granted => {}
        AccessCheck::RequiresAuth => {
            return Err(ApiError::Unauthenticated(
                "authentication required".to_string(),
            ))
        }
        AccessCheck::Denied => {
            return Err(ApiError::Forbidden(
                "booking belongs to a different account".to_string(),
            ))
        }
    }

    Ok(Json(BookingResponse::from_parts(
        loaded.booking,
        loaded.items,
    )))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmBookingBody>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    // 1. Run the confirmation flow.
    match state
        .confirmations
        .confirm(id, &body.payment_reference, &caller)
        .await
    {
        Ok(confirmed) => {
            state
                .metrics
                .confirmations
                .with_label_values(&["confirmed"])
                .inc();
            Ok(Json(ConfirmResponse {
                booking: ConfirmedBookingBody {
                    id: confirmed.booking.id,
                    booking_reference: confirmed.booking.booking_reference.unwrap_or_default(),
                    status: confirmed.booking.status.as_str().to_string(),
                    booking_date: confirmed.booking.booking_date,
                    final_minor: confirmed.booking.final_minor,
                    currency: confirmed.booking.currency,
                    items: confirmed
                        .items
                        .into_iter()
                        .map(BookingItemResponse::from)
                        .collect(),
                },
                payment_confirmation: PaymentConfirmationBody {
                    reference: confirmed.payment.reference,
                    amount_minor: confirmed.payment.amount_minor,
                    currency: confirmed.payment.currency,
                    status: confirmed.payment.status,
                },
                notifications: confirmed.notifications,
            }))
        }

        // 2. An already-confirmed booking replays as success: a client
        //    retrying a timed-out call must not see an error. The ownership
        //    gate has already passed by the time this variant is produced.
        //    The body is rebuilt from the stored row without a second
        //    provider call; a CONFIRMED row exists only after the payment
        //    settled.
        Err(ConfirmError::AlreadyConfirmed { reference }) => {
            state
                .metrics
                .confirmations
                .with_label_values(&["replayed"])
                .inc();
            let loaded = state
                .store
                .find_booking_with_items(id)
                .await?
                .ok_or_else(|| ApiError::NotFound("booking not found".to_string()))?;
            let notifications = state.confirmations.replayed_schedule(&loaded.booking);
            Ok(Json(ConfirmResponse {
                booking: ConfirmedBookingBody {
                    id,
                    booking_reference: reference,
                    status: BookingStatus::Confirmed.as_str().to_string(),
                    booking_date: loaded.booking.booking_date,
                    final_minor: loaded.booking.final_minor,
                    currency: loaded.booking.currency.clone(),
                    items: loaded
                        .items
                        .into_iter()
                        .map(BookingItemResponse::from)
                        .collect(),
                },
                payment_confirmation: PaymentConfirmationBody {
                    reference: loaded.booking.payment_reference.unwrap_or_default(),
                    amount_minor: loaded.booking.final_minor,
                    currency: loaded.booking.currency,
                    status: PaymentStatus::Succeeded,
                },
                notifications,
            }))
        }

        Err(err) => {
            state
                .metrics
                .confirmations
                .with_label_values(&[confirm_outcome(&err)])
                .inc();
            Err(ApiError::from(err))
        }
    }
}

fn confirm_outcome(err: &ConfirmError) -> &'static str {
    match err {
        ConfirmError::Unauthenticated | ConfirmError::AccessDenied => "denied",
        ConfirmError::NotFound => "not_found",
        ConfirmError::AlreadyConfirmed { .. } => "replayed",
        ConfirmError::InvalidState { .. } => "invalid_state",
        ConfirmError::EmptyBooking => "empty",
        ConfirmError::Payment(PaymentVerifyError::GatewayUnavailable(_)) => "provider_unavailable",
        ConfirmError::Payment(_) => "payment_rejected",
        ConfirmError::InsufficientAvailability { .. } => "sold_out",
        ConfirmError::ReferenceCollisionExhausted => "reference_exhausted",
        ConfirmError::PostPaymentCommitFailure { .. } => "commit_failed",
        ConfirmError::Store(_) => "storage_error",
    }
}
