use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is making the request, as resolved by the session layer.
///
/// Guest checkout is a first-class path: an absent bearer token is a valid
/// `Guest` caller, not an authentication failure. Handlers that require a
/// registered account reject `Guest` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caller {
    User(Uuid),
    Guest,
}

impl Caller {
    pub fn is_guest(&self) -> bool {
        matches!(self, Caller::Guest)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::User(id) => Some(*id),
            Caller::Guest => None,
        }
    }
}
