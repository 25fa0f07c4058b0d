//! Server-side payment verification.
//!
//! The client hands us a payment reference; nothing it claims about the
//! charge is trusted. We fetch the provider's record and check settlement,
//! amount and currency ourselves before any state changes.

use std::sync::Arc;
use std::time::Duration;

use revel_core::{GatewayError, PaymentFacts, PaymentGateway, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum PaymentVerifyError {
    /// The provider has no record of this reference.
    #[error("payment reference not recognized by the provider")]
    InvalidReference,

    #[error("payment has not completed (status {})", .status.as_str())]
    Incomplete { status: PaymentStatus },

    /// Charged amount or currency does not match the booking. Amounts are
    /// minor units.
    #[error("payment amount mismatch: expected {expected_minor}, charged {actual_minor}")]
    AmountMismatch {
        expected_minor: i64,
        actual_minor: i64,
    },

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

/// Checks a claimed payment against the provider's record.
pub struct PaymentVerifier {
    gateway: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentVerifier {
    pub fn new(gateway: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Retrieve the charge and require: settled, exact amount in minor
    /// units, matching currency (case-insensitive). Returns the provider's
    /// facts so callers can log what was actually charged.
    pub async fn verify(
        &self,
        reference: &str,
        expected_minor: i64,
        expected_currency: &str,
    ) -> Result<PaymentFacts, PaymentVerifyError> {
        let retrieved = tokio::time::timeout(self.timeout, self.gateway.retrieve_payment(reference))
            .await
            .map_err(|_| {
                PaymentVerifyError::GatewayUnavailable(format!(
                    "no response within {:?}",
                    self.timeout
                ))
            })?;

        let facts = match retrieved {
            Ok(facts) => facts,
            Err(GatewayError::NotFound(_)) => return Err(PaymentVerifyError::InvalidReference),
            Err(GatewayError::Unavailable(msg)) => {
                return Err(PaymentVerifyError::GatewayUnavailable(msg))
            }
        };

        if !facts.status.is_settled() {
            return Err(PaymentVerifyError::Incomplete {
                status: facts.status,
            });
        }

        if facts.amount_minor != expected_minor
            || !facts.currency.eq_ignore_ascii_case(expected_currency)
        {
            tracing::warn!(
                reference,
                expected_minor,
                actual_minor = facts.amount_minor,
                expected_currency,
                actual_currency = %facts.currency,
                "payment does not match booking"
            );
            return Err(PaymentVerifyError::AmountMismatch {
                expected_minor,
                actual_minor: facts.amount_minor,
            });
        }

        Ok(facts)
    }
}
