use anyhow::Context;
use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, middleware::auth::Claims, state::AppState};

#[derive(Debug, Deserialize)]
struct DevTokenRequest {
    role: String,
    user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/dev-token", post(dev_token))
}

/// Mint a signed token for local development and demos. Hidden entirely
/// unless `auth.dev_tokens` is set, so the route 404s in production.
async fn dev_token(
    State(state): State<AppState>,
    Json(req): Json<DevTokenRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if !state.auth.dev_tokens {
        return Err(ApiError::NotFound("not found".to_string()));
    }

    let role = match req.role.as_str() {
        "CUSTOMER" | "ADMIN" => req.role,
        other => {
            return Err(ApiError::Validation(format!(
                "unsupported role {other:?}, expected CUSTOMER or ADMIN"
            )))
        }
    };

    let claims = Claims {
        sub: req.user_id.unwrap_or_else(Uuid::new_v4).to_string(),
        role,
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .context("token encoding failed")?;

    Ok(Json(AuthResponse { token }))
}
