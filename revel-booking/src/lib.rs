//! Booking domain: checkout, confirmation, cancellation and refunds for
//! venue hire, plus the storage seam the flows run against.

pub mod checkout;
pub mod confirmation;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod reference;
pub mod refund;
pub mod store;
pub mod verifier;

pub use checkout::{
    CheckoutError, CheckoutService, CreateBookingRequest, GuestDetails, ItemSelection,
};
pub use confirmation::{
    ConfirmError, ConfirmationOrchestrator, ConfirmedBooking, DEFAULT_REFERENCE_ATTEMPTS,
};
pub use lifecycle::{BookingLifecycle, CancelError};
pub use memory::MemoryStore;
pub use models::{
    AccessCheck, Booking, BookingItem, BookingStatus, EmailQueueEntry, EmailStatus, EmailType,
    NewEmailQueueEntry, NotificationSchedule,
};
pub use notifications::{NotificationPlanner, PlannedNotifications, DEFAULT_REMINDER_LEAD_HOURS};
pub use reference::{
    is_valid_reference, ReferenceGenerator, ShortCodeGenerator, REFERENCE_ALPHABET,
    REFERENCE_LENGTH,
};
pub use refund::{RefundError, RefundProcessor, RefundedBooking};
pub use store::{BookingFilter, BookingStore, BookingWithItems, StoreError, StoreTx};
pub use verifier::{PaymentVerifier, PaymentVerifyError};
