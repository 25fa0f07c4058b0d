pub mod identity;
pub mod payment;

pub use identity::Caller;
pub use payment::{
    GatewayError, MockPaymentGateway, PaymentFacts, PaymentGateway, PaymentStatus, RefundFacts,
    RefundStatus, MOCK_OUTAGE_REFERENCE,
};
