pub mod money;
pub mod pii;

pub use money::format_minor;
pub use pii::{redact_email, Masked};
