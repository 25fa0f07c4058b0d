use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use revel_catalog::AvailabilityEntry;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    item_type: String,
    item_id: Uuid,
    date: NaiveDate,
    total_quantity: i32,
    available_quantity: i32,
}

impl From<AvailabilityEntry> for AvailabilityResponse {
    fn from(entry: AvailabilityEntry) -> Self {
        Self {
            item_type: entry.item.item_type.as_str().to_string(),
            item_id: entry.item.item_id,
            date: entry.date,
            total_quantity: entry.total_quantity,
            available_quantity: entry.available_quantity,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/availability", get(list_availability))
}

/// Date-picker feed: what is still reservable on one date. Items with no
/// row are unconstrained and simply do not appear.
async fn list_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailabilityResponse>>, ApiError> {
    let entries = state.store.list_availability(query.date).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(AvailabilityResponse::from)
            .collect(),
    ))
}
