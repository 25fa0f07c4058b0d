use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use revel_api::{
    app,
    metrics::ApiMetrics,
    middleware::Claims,
    state::{AppState, AuthConfig, RateLimitSettings},
};
use revel_booking::{
    BookingLifecycle, BookingStore, CheckoutService, ConfirmationOrchestrator, MemoryStore,
    NotificationPlanner, PaymentVerifier, RefundProcessor, ShortCodeGenerator,
};
use revel_catalog::{ItemKey, Package};
use revel_core::MockPaymentGateway;

const TEST_SECRET: &str = "integration-test-secret";

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    gateway: Arc<MockPaymentGateway>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let store_dyn: Arc<dyn BookingStore> = store.clone();
    let planner = NotificationPlanner::new(24);

    let state = AppState {
        store: store_dyn.clone(),
        checkout: Arc::new(CheckoutService::new(store_dyn.clone(), "GBP")),
        confirmations: Arc::new(ConfirmationOrchestrator::new(
            store_dyn.clone(),
            PaymentVerifier::new(gateway.clone(), Duration::from_secs(2)),
            Arc::new(ShortCodeGenerator),
            planner,
        )),
        lifecycle: Arc::new(BookingLifecycle::new(store_dyn.clone())),
        refunds: Arc::new(RefundProcessor::new(
            store_dyn,
            gateway.clone(),
            planner,
            Duration::from_secs(2),
        )),
        redis: None,
        metrics: Arc::new(ApiMetrics::new().unwrap()),
        auth: AuthConfig {
            secret: TEST_SECRET.to_string(),
            expiration: 3600,
            dev_tokens: true,
        },
        rate_limit: RateLimitSettings {
            requests: 100,
            window_seconds: 60,
        },
    };

    Harness {
        app: app(state),
        store,
        gateway,
    }
}

fn mint_token(role: &str, sub: Uuid) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn send_text(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn event_date() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(30)
}

fn gold_package() -> Package {
    Package {
        id: Uuid::new_v4(),
        name: "Gold Wedding Package".to_string(),
        description: None,
        price_minor: 250_000,
        is_active: true,
        metadata: json!({}),
    }
}

async fn create_guest_booking(h: &Harness, package: &Package, quantity: i32) -> Value {
    let (status, body) = send(
        &h.app,
        post_json(
            "/v1/bookings",
            None,
            json!({
                "booking_date": event_date().to_string(),
                "items": [{"item_type": "PACKAGE", "item_id": package.id, "quantity": quantity}],
                "guest": {"name": "Ada Fox", "email": "ada@example.org"},
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
    body
}

#[tokio::test]
async fn test_guest_booking_confirmation_flow() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 3)
        .await;

    // Checkout creates a PENDING booking with no reference yet.
    let created = create_guest_booking(&h, &package, 1).await;
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["final_minor"], 250_000);
    assert_eq!(created["currency"], "GBP");
    assert!(created["booking_reference"].is_null());
    let booking_id = created["id"].as_str().unwrap().to_string();

    // Confirm against a settled charge for the exact amount.
    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "confirm failed: {body}");

    // The body carries the booking, the settled payment and the email
    // schedule as separate blocks.
    assert_eq!(body["booking"]["status"], "CONFIRMED");
    assert_eq!(body["booking"]["booking_date"], event_date().to_string());
    assert_eq!(body["booking"]["final_minor"], 250_000);
    let items = body["booking"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Gold Wedding Package");
    assert_eq!(items[0]["quantity"], 1);
    let reference = body["booking"]["booking_reference"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(reference.len(), 8);

    assert_eq!(body["payment_confirmation"]["reference"], "pi_abc");
    assert_eq!(body["payment_confirmation"]["amount_minor"], 250_000);
    assert_eq!(body["payment_confirmation"]["currency"], "GBP");
    assert_eq!(body["payment_confirmation"]["status"], "SUCCEEDED");

    // Confirmation email due now, reminder 24h before midnight UTC on the
    // booking date.
    body["notifications"]["confirmation_scheduled_for"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .unwrap();
    let reminder: DateTime<Utc> = body["notifications"]["reminder_scheduled_for"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(
        reminder,
        event_date().and_time(NaiveTime::MIN).and_utc() - chrono::Duration::hours(24)
    );

    // The stored booking now carries the reference and the payment id.
    let (status, fetched) = send(&h.app, get_request(&format!("/v1/bookings/{booking_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "CONFIRMED");
    assert_eq!(fetched["booking_reference"], reference.as_str());
    assert_eq!(fetched["payment_reference"], "pi_abc");
    assert_eq!(fetched["guest_email"], "ada@example.org");

    // One slot was reserved for the date.
    let (status, feed) = send(
        &h.app,
        get_request(&format!("/v1/availability?date={}", event_date()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = feed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["available_quantity"], 2);
    assert_eq!(entries[0]["total_quantity"], 3);

    // Confirmation and reminder emails are queued atomically with the flip.
    assert_eq!(h.store.emails().await.len(), 2);
}

#[tokio::test]
async fn test_confirm_replay_returns_success() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 3)
        .await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let confirm_uri = format!("/v1/bookings/{booking_id}/confirm");
    let confirm_body = json!({"payment_reference": "pi_abc"});

    let (status, first) = send(&h.app, post_json(&confirm_uri, None, confirm_body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    // A retried confirm is a success replay, not an error, and must not
    // touch the provider or the inventory again.
    let (status, second) = send(&h.app, post_json(&confirm_uri, None, confirm_body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["booking"]["status"], "CONFIRMED");
    assert_eq!(
        second["booking"]["booking_reference"],
        first["booking"]["booking_reference"]
    );
    assert_eq!(second["booking"]["items"].as_array().unwrap().len(), 1);

    // The payment echo is rebuilt from the stored row, the reminder slot
    // from the booking date, so a replay reads the same as the original.
    assert_eq!(second["payment_confirmation"]["reference"], "pi_abc");
    assert_eq!(second["payment_confirmation"]["amount_minor"], 250_000);
    assert_eq!(second["payment_confirmation"]["status"], "SUCCEEDED");
    assert_eq!(
        second["notifications"]["reminder_scheduled_for"],
        first["notifications"]["reminder_scheduled_for"]
    );

    assert_eq!(h.gateway.retrieve_count(), 1);
    assert_eq!(
        h.store
            .available_quantity(&ItemKey::package(package.id), event_date())
            .await,
        Some(2)
    );
    assert_eq!(h.store.emails().await.len(), 2);
}

#[tokio::test]
async fn test_confirm_rejects_amount_mismatch() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 3)
        .await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    // Charge settled for the wrong amount.
    h.gateway.seed_payment("pi_short", 100_000, "GBP");
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_short"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION");

    // Nothing was reserved and the booking still reads PENDING.
    let (_, fetched) = send(&h.app, get_request(&format!("/v1/bookings/{booking_id}"), None)).await;
    assert_eq!(fetched["status"], "PENDING");
    assert_eq!(
        h.store
            .available_quantity(&ItemKey::package(package.id), event_date())
            .await,
        Some(3)
    );
}

#[tokio::test]
async fn test_confirm_gateway_outage_returns_503() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": revel_core::MOCK_OUTAGE_REFERENCE}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_confirm_insufficient_availability() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 1)
        .await;

    let created = create_guest_booking(&h, &package, 2).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    h.gateway.seed_payment("pi_abc", 500_000, "GBP");
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    // Sold-out inventory gets its own code so clients can offer a date
    // change, unlike the CONFLICT returned for a wrong-state booking.
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_AVAILABILITY");

    // The failed reservation rolled back; the single slot survives.
    assert_eq!(
        h.store
            .available_quantity(&ItemKey::package(package.id), event_date())
            .await,
        Some(1)
    );
    let (_, fetched) = send(&h.app, get_request(&format!("/v1/bookings/{booking_id}"), None)).await;
    assert_eq!(fetched["status"], "PENDING");
}

#[tokio::test]
async fn test_checkout_rejects_past_date() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;

    let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
    let (status, body) = send(
        &h.app,
        post_json(
            "/v1/bookings",
            None,
            json!({
                "booking_date": yesterday.to_string(),
                "items": [{"item_type": "PACKAGE", "item_id": package.id, "quantity": 1}],
                "guest": {"name": "Ada Fox", "email": "ada@example.org"},
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn test_account_booking_ownership() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    let owner = Uuid::new_v4();
    h.store.seed_user(owner, "owner@example.org").await;

    // Account checkout: token identifies the owner, no guest block.
    let owner_token = mint_token("CUSTOMER", owner);
    let (status, created) = send(
        &h.app,
        post_json(
            "/v1/bookings",
            Some(&owner_token),
            json!({
                "booking_date": event_date().to_string(),
                "items": [{"item_type": "PACKAGE", "item_id": package.id, "quantity": 1}],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/v1/bookings/{booking_id}");

    // Anonymous callers are told to authenticate, other accounts are denied.
    let (status, _) = send(&h.app, get_request(&uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger_token = mint_token("CUSTOMER", Uuid::new_v4());
    let (status, _) = send(&h.app, get_request(&uri, Some(&stranger_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, fetched) = send(&h.app, get_request(&uri, Some(&owner_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["guest_name"], Value::Null);
}

#[tokio::test]
async fn test_malformed_bearer_rejected() {
    let h = harness();
    let uri = format!("/v1/bookings/{}", Uuid::new_v4());

    let (status, _) = send(&h.app, get_request(&uri, Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let h = harness();

    let (status, _) = send(&h.app, get_request("/v1/admin/bookings", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = mint_token("CUSTOMER", Uuid::new_v4());
    let (status, _) = send(&h.app, get_request("/v1/admin/bookings", Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = mint_token("ADMIN", Uuid::new_v4());
    let (status, body) = send(&h.app, get_request("/v1/admin/bookings", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_admin_list_filters_by_status() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 3)
        .await;

    let first = create_guest_booking(&h, &package, 1).await;
    let _second = create_guest_booking(&h, &package, 1).await;

    let booking_id = first["id"].as_str().unwrap().to_string();
    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let (status, _) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let admin = mint_token("ADMIN", Uuid::new_v4());
    let (status, listed) = send(
        &h.app,
        get_request("/v1/admin/bookings?status=CONFIRMED", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = listed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], booking_id.as_str());
    assert_eq!(rows[0]["status"], "CONFIRMED");
}

#[tokio::test]
async fn test_admin_cancel_flow() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    let admin = mint_token("ADMIN", Uuid::new_v4());
    let cancel_uri = format!("/v1/admin/bookings/{booking_id}/cancel");

    let (status, body) = send(&h.app, post_json(&cancel_uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    // Cancelled is terminal; a second cancel is a state conflict.
    let (status, body) = send(&h.app, post_json(&cancel_uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_admin_refund_flow() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    h.store
        .seed_availability(ItemKey::package(package.id), event_date(), 3)
        .await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let (status, _) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Full refund: omitted amount refunds the final total and restocks.
    let admin = mint_token("ADMIN", Uuid::new_v4());
    let refund_uri = format!("/v1/admin/bookings/{booking_id}/refund");
    let (status, body) = send(&h.app, post_json(&refund_uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::OK, "refund failed: {body}");
    assert_eq!(body["status"], "REFUNDED");
    assert_eq!(body["refunded_minor"], 250_000);
    assert_eq!(body["refund_reference"], "re_pi_abc");
    assert_eq!(body["refund_status"], "SUCCEEDED");

    assert_eq!(
        h.store
            .available_quantity(&ItemKey::package(package.id), event_date())
            .await,
        Some(3)
    );
    // Confirmation, reminder, then the refund notice.
    assert_eq!(h.store.emails().await.len(), 3);

    // Refunded is terminal.
    let (status, body) = send(&h.app, post_json(&refund_uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_admin_refund_rejects_excess_amount() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let (status, _) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let admin = mint_token("ADMIN", Uuid::new_v4());
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/v1/admin/bookings/{booking_id}/refund"),
            Some(&admin),
            json!({"amount_minor": 300_000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION");
    assert_eq!(h.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_dev_token_endpoint_mints_usable_tokens() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        post_json("/v1/auth/dev-token", None, json!({"role": "ADMIN"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&h.app, get_request("/v1/admin/bookings", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.app,
        post_json("/v1/auth/dev-token", None, json!({"role": "SUPERUSER"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn test_metrics_endpoint_exports_counters() {
    let h = harness();
    let package = gold_package();
    h.store.seed_package(package.clone()).await;
    let created = create_guest_booking(&h, &package, 1).await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    h.gateway.seed_payment("pi_abc", 250_000, "GBP");
    let (status, _) = send(
        &h.app,
        post_json(
            &format!("/v1/bookings/{booking_id}/confirm"),
            None,
            json!({"payment_reference": "pi_abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, text) = send_text(&h.app, get_request("/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("revel_bookings_created_total 1"));
    assert!(text.contains("revel_confirmations_total{outcome=\"confirmed\"} 1"));
}
