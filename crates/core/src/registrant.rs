//! Registrant contact data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::RegistrantId;

/// Legal contact/address information submitted for registrar compliance.
///
/// Immutable once created; owned by the job that created it. Exactly one
/// registrant record exists per job needing registration, referenced via
/// `JobMetadata::registrant_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRegistrant {
    pub id: RegistrantId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Raw phone number as entered; providers normalize it on submission.
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// Two-letter country code (ISO 3166-1 alpha-2).
    pub country: String,
    /// Requester IP captured for consent logging, where the provider
    /// requires it.
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DomainRegistrant {
    /// Validate the fields registrars universally reject when absent.
    pub fn validate(&self) -> DomainResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(DomainError::validation("registrant name is required"));
        }
        if !self.email.contains('@') {
            return Err(DomainError::validation("registrant email is invalid"));
        }
        if self.country.len() != 2 {
            return Err(DomainError::validation(
                "registrant country must be a two-letter code",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomainRegistrant {
        DomainRegistrant {
            id: RegistrantId::new(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "(555) 123-4567".into(),
            street: "1 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            postal_code: "SW1A".into(),
            country: "GB".into(),
            client_ip: Some("203.0.113.7".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_registrant_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_bad_email_and_country() {
        let mut r = sample();
        r.email = "not-an-email".into();
        assert!(r.validate().is_err());

        let mut r = sample();
        r.country = "GBR".into();
        assert!(r.validate().is_err());
    }
}
