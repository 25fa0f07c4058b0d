use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for sensitive values (guest names, contact emails) that masks
/// the inner value in Debug output so it cannot leak through log macros.
///
/// Serialization passes the real value through: API responses need it, only
/// `{:?}`-style logging is the leak vector we guard against.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

/// Redact an email address down to a loggable hint: first character of the
/// local part plus the domain, e.g. `j***@example.org`. Malformed addresses
/// collapse to `***`.
pub fn redact_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_masked() {
        let email = Masked("guest@example.org".to_string());
        assert_eq!(format!("{:?}", email), "********");
        assert_eq!(format!("{}", email), "********");
    }

    #[test]
    fn serialization_passes_through() {
        let email = Masked("guest@example.org".to_string());
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"guest@example.org\"");
    }

    #[test]
    fn redaction_keeps_domain_only() {
        assert_eq!(redact_email("jane@example.org"), "j***@example.org");
        assert_eq!(redact_email("x@y.co"), "x***@y.co");
        assert_eq!(redact_email("not-an-email"), "***");
        assert_eq!(redact_email("@nodomain"), "***");
    }
}
