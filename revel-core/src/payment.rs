use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Only `Succeeded` counts as a terminal-success state; everything else
    /// means the charge has not (or will never) complete.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "REQUIRES_PAYMENT_METHOD",
            PaymentStatus::RequiresAction => "REQUIRES_ACTION",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

/// What the provider reports for one charge, normalized to minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFacts {
    pub reference: String, // provider's id (e.g. pi_123)
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFacts {
    pub reference: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: RefundStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no payment with reference {0}")]
    NotFound(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetch the provider's view of a charge by its reference.
    async fn retrieve_payment(&self, reference: &str) -> Result<PaymentFacts, GatewayError>;

    /// Issue a (full or partial) refund against a settled charge.
    async fn refund_payment(
        &self,
        reference: &str,
        amount_minor: i64,
    ) -> Result<RefundFacts, GatewayError>;
}

/// Reference that makes the mock behave as if the provider is unreachable.
pub const MOCK_OUTAGE_REFERENCE: &str = "pi_gateway_down";

/// In-memory gateway used by the test suites and wired in when
/// `payment.provider = "mock"`. Payments are seeded up front; retrievals are
/// counted so tests can assert the short-circuit paths never re-hit the
/// provider.
#[derive(Default)]
pub struct MockPaymentGateway {
    payments: Mutex<HashMap<String, PaymentFacts>>,
    retrieve_calls: AtomicUsize,
    refund_calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a settled charge the mock will report back.
    pub fn seed_payment(&self, reference: &str, amount_minor: i64, currency: &str) {
        self.seed_payment_with_status(reference, amount_minor, currency, PaymentStatus::Succeeded);
    }

    pub fn seed_payment_with_status(
        &self,
        reference: &str,
        amount_minor: i64,
        currency: &str,
        status: PaymentStatus,
    ) {
        let facts = PaymentFacts {
            reference: reference.to_string(),
            amount_minor,
            currency: currency.to_string(),
            status,
            created_at: Utc::now(),
        };
        self.payments
            .lock()
            .unwrap()
            .insert(reference.to_string(), facts);
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    pub fn refund_count(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn retrieve_payment(&self, reference: &str) -> Result<PaymentFacts, GatewayError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);

        // Trigger for testing the outage path
        if reference == MOCK_OUTAGE_REFERENCE {
            return Err(GatewayError::Unavailable("simulated outage".to_string()));
        }

        tracing::debug!(reference, "mock gateway retrieve");

        self.payments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(reference.to_string()))
    }

    async fn refund_payment(
        &self,
        reference: &str,
        amount_minor: i64,
    ) -> Result<RefundFacts, GatewayError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);

        if reference == MOCK_OUTAGE_REFERENCE {
            return Err(GatewayError::Unavailable("simulated outage".to_string()));
        }

        let payments = self.payments.lock().unwrap();
        let facts = payments
            .get(reference)
            .ok_or_else(|| GatewayError::NotFound(reference.to_string()))?;

        Ok(RefundFacts {
            reference: format!("re_{}", reference),
            amount_minor,
            currency: facts.currency.clone(),
            status: RefundStatus::Succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_reports_seeded_payment() {
        let gateway = MockPaymentGateway::new();
        gateway.seed_payment("pi_abc", 15000, "GBP");

        let facts = gateway.retrieve_payment("pi_abc").await.unwrap();
        assert_eq!(facts.amount_minor, 15000);
        assert!(facts.status.is_settled());
        assert_eq!(gateway.retrieve_count(), 1);
    }

    #[tokio::test]
    async fn mock_reports_unknown_reference() {
        let gateway = MockPaymentGateway::new();
        let err = gateway.retrieve_payment("pi_missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn mock_simulates_outage() {
        let gateway = MockPaymentGateway::new();
        let err = gateway
            .retrieve_payment(MOCK_OUTAGE_REFERENCE)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn mock_refunds_in_payment_currency() {
        let gateway = MockPaymentGateway::new();
        gateway.seed_payment("pi_abc", 15000, "GBP");

        let refund = gateway.refund_payment("pi_abc", 5000).await.unwrap();
        assert_eq!(refund.amount_minor, 5000);
        assert_eq!(refund.currency, "GBP");
        assert_eq!(refund.status, RefundStatus::Succeeded);
    }
}
