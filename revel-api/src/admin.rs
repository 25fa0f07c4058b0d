use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use revel_booking::{Booking, BookingFilter, BookingStatus, RefundError};
use revel_core::RefundStatus;
use revel_shared::Masked;

use crate::bookings::BookingItemResponse;
use crate::error::ApiError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    date: Option<NaiveDate>,
    status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    /// Omitted for a full refund of the booking's final amount.
    amount_minor: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AdminBookingResponse {
    id: Uuid,
    booking_reference: Option<String>,
    status: String,
    booking_date: NaiveDate,
    total_minor: i64,
    discount_minor: i64,
    final_minor: i64,
    currency: String,
    user_id: Option<Uuid>,
    guest_name: Option<Masked<String>>,
    guest_email: Option<Masked<String>>,
    payment_reference: Option<String>,
    refunded_minor: Option<i64>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Booking> for AdminBookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            booking_reference: booking.booking_reference,
            status: booking.status.as_str().to_string(),
            booking_date: booking.booking_date,
            total_minor: booking.total_minor,
            discount_minor: booking.discount_minor,
            final_minor: booking.final_minor,
            currency: booking.currency,
            user_id: booking.user_id,
            guest_name: booking.guest_name.map(Masked),
            guest_email: booking.guest_email.map(Masked),
            payment_reference: booking.payment_reference,
            refunded_minor: booking.refunded_minor,
            refunded_at: booking.refunded_at,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct AdminBookingDetail {
    booking: AdminBookingResponse,
    items: Vec<BookingItemResponse>,
}

#[derive(Debug, Serialize)]
struct RefundResponse {
    booking_id: Uuid,
    status: String,
    refunded_minor: i64,
    refunded_at: Option<DateTime<Utc>>,
    refund_reference: String,
    refund_status: RefundStatus,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{id}", get(get_booking))
        .route("/v1/admin/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/admin/bookings/{id}/refund", post(refund_booking))
        .layer(axum::middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/bookings?date=&status=
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<AdminBookingResponse>>, ApiError> {
    let filter = BookingFilter {
        booking_date: query.date,
        status: query.status,
    };
    let bookings = state.store.list_bookings(filter).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(AdminBookingResponse::from)
            .collect(),
    ))
}

/// GET /v1/admin/bookings/:id
async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminBookingDetail>, ApiError> {
    let loaded = state
        .store
        .find_booking_with_items(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("booking not found".to_string()))?;

    Ok(Json(AdminBookingDetail {
        booking: AdminBookingResponse::from(loaded.booking),
        items: loaded
            .items
            .into_iter()
            .map(BookingItemResponse::from)
            .collect(),
    }))
}

/// POST /v1/admin/bookings/:id/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminBookingResponse>, ApiError> {
    let booking = state.lifecycle.cancel(id).await?;
    Ok(Json(AdminBookingResponse::from(booking)))
}

/// POST /v1/admin/bookings/:id/refund
async fn refund_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RefundBody>,
) -> Result<Json<RefundResponse>, ApiError> {
    match state.refunds.refund(id, body.amount_minor).await {
        Ok(refunded) => {
            state.metrics.refunds.with_label_values(&["refunded"]).inc();
            Ok(Json(RefundResponse {
                booking_id: refunded.booking.id,
                status: refunded.booking.status.as_str().to_string(),
                refunded_minor: refunded.refund.amount_minor,
                refunded_at: refunded.booking.refunded_at,
                refund_reference: refunded.refund.reference,
                refund_status: refunded.refund.status,
            }))
        }
        Err(err) => {
            state
                .metrics
                .refunds
                .with_label_values(&[refund_outcome(&err)])
                .inc();
            Err(ApiError::from(err))
        }
    }
}

fn refund_outcome(err: &RefundError) -> &'static str {
    match err {
        RefundError::NotFound => "not_found",
        RefundError::InvalidState { .. } => "invalid_state",
        RefundError::InvalidAmount { .. } => "invalid_amount",
        RefundError::MissingPaymentReference => "missing_reference",
        RefundError::PaymentNotFound => "payment_unknown",
        RefundError::RefundRejected => "provider_rejected",
        RefundError::GatewayUnavailable(_) => "provider_unavailable",
        RefundError::PostRefundCommitFailure { .. } => "commit_failed",
        RefundError::Store(_) => "storage_error",
    }
}
