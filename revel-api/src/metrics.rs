//! Prometheus counters for the booking surface, exported at GET /metrics.

use axum::extract::State;
use prometheus::{opts, CounterVec, IntCounter, Registry, TextEncoder};

use crate::error::ApiError;
use crate::state::AppState;

pub struct ApiMetrics {
    registry: Registry,
    /// Bookings created through checkout.
    pub bookings_created: IntCounter,
    /// Confirmation attempts, labelled by outcome ("confirmed", "replayed",
    /// "payment_rejected", ...).
    pub confirmations: CounterVec,
    /// Refund attempts, labelled by outcome.
    pub refunds: CounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new(
            "revel_bookings_created_total",
            "Bookings created through checkout",
        )?;
        let confirmations = CounterVec::new(
            opts!(
                "revel_confirmations_total",
                "Booking confirmation attempts by outcome"
            ),
            &["outcome"],
        )?;
        let refunds = CounterVec::new(
            opts!("revel_refunds_total", "Refund attempts by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(refunds.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            confirmations,
            refunds,
        })
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .export()
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_lists_every_counter_after_first_use() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.bookings_created.inc();
        metrics.confirmations.with_label_values(&["confirmed"]).inc();
        metrics.refunds.with_label_values(&["refunded"]).inc();

        let text = metrics.export().unwrap();
        assert!(text.contains("revel_bookings_created_total 1"));
        assert!(text.contains("revel_confirmations_total{outcome=\"confirmed\"} 1"));
        assert!(text.contains("revel_refunds_total{outcome=\"refunded\"} 1"));
    }
}
