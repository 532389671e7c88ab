use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/userdata`. Both fields are optional on the wire so a
/// missing one surfaces as our own 400 rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CreateContact {
    /// Trimmed `(name, email)` if both are present and non-blank.
    pub fn validated(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let email = self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((name, email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_missing_fields_fail_validation() {
        let missing: CreateContact = serde_json::from_str(r#"{"name":"Ann"}"#).unwrap();
        assert!(missing.validated().is_none());

        let blank: CreateContact =
            serde_json::from_str(r#"{"name":"  ","email":"a@b.com"}"#).unwrap();
        assert!(blank.validated().is_none());
    }

    #[test]
    fn valid_body_is_trimmed() {
        let body: CreateContact =
            serde_json::from_str(r#"{"name":" Ann ","email":"a@b.com "}"#).unwrap();
        assert_eq!(body.validated(), Some(("Ann", "a@b.com")));
    }
}
