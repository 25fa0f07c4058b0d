use std::sync::Arc;

use revel_booking::{
    BookingLifecycle, BookingStore, CheckoutService, ConfirmationOrchestrator, RefundProcessor,
};
use revel_store::RedisClient;

use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub dev_tokens: bool,
}

#[derive(Clone, Copy)]
pub struct RateLimitSettings {
    pub requests: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub checkout: Arc<CheckoutService>,
    pub confirmations: Arc<ConfirmationOrchestrator>,
    pub lifecycle: Arc<BookingLifecycle>,
    pub refunds: Arc<RefundProcessor>,
    /// Absent in test harnesses; the rate limiter steps aside without it.
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
}
