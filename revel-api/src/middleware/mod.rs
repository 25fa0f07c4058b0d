pub mod auth;

pub use auth::{admin_auth_middleware, caller_middleware, Claims};
