use revel_api::{
    app,
    metrics::ApiMetrics,
    state::{AppState, AuthConfig, RateLimitSettings},
};
use revel_booking::{
    BookingLifecycle, CheckoutService, ConfirmationOrchestrator, NotificationPlanner,
    PaymentVerifier, RefundProcessor, ShortCodeGenerator,
};
use revel_core::{MockPaymentGateway, PaymentGateway};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revel_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = revel_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Revel API on port {}", config.server.port);

    // Postgres Connection
    let db = revel_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Redis Connection
    let redis_client = revel_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");

    let gateway: Arc<dyn PaymentGateway> = match config.payment.provider.as_str() {
        "mock" => Arc::new(MockPaymentGateway::new()),
        other => panic!("Unknown payment provider: {other}"),
    };
    let verify_timeout = Duration::from_secs(config.payment.verify_timeout_seconds);

    let store: Arc<dyn revel_booking::BookingStore> =
        Arc::new(revel_store::PgBookingStore::new(db.pool.clone()));
    let planner = NotificationPlanner::new(config.booking_rules.reminder_lead_hours);

    let confirmations = ConfirmationOrchestrator::new(
        store.clone(),
        PaymentVerifier::new(gateway.clone(), verify_timeout),
        Arc::new(ShortCodeGenerator),
        planner,
    )
    .with_reference_attempts(config.booking_rules.reference_max_attempts);

    let app_state = AppState {
        store: store.clone(),
        checkout: Arc::new(CheckoutService::new(
            store.clone(),
            config.booking_rules.currency.clone(),
        )),
        confirmations: Arc::new(confirmations),
        lifecycle: Arc::new(BookingLifecycle::new(store.clone())),
        refunds: Arc::new(RefundProcessor::new(
            store,
            gateway,
            planner,
            verify_timeout,
        )),
        redis: Some(Arc::new(redis_client)),
        metrics: Arc::new(ApiMetrics::new().expect("Failed to build metrics registry")),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            dev_tokens: config.auth.dev_tokens,
        },
        rate_limit: RateLimitSettings {
            requests: config.rate_limit.requests,
            window_seconds: config.rate_limit.window_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
