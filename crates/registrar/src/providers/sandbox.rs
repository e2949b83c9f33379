//! In-process sandbox provider for non-production testing.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use domainforge_core::DomainRegistrant;

use crate::contact::format_phone;
use crate::error::RegistrarError;
use crate::provider::{DomainSearch, Registrar, Registration};

/// Registrar that answers locally without touching any real API.
///
/// Every domain is reported available and registrations return a fabricated
/// order id, which makes it useless and dangerous outside testing. The
/// `test_mode` flag must therefore be set explicitly; when it is not, every
/// call fails with [`RegistrarError::SandboxDisabled`] instead of silently
/// pretending success in production.
pub struct SandboxRegistrar {
    test_mode: bool,
}

impl SandboxRegistrar {
    pub fn new(test_mode: bool) -> Self {
        Self { test_mode }
    }

    fn guard(&self) -> Result<(), RegistrarError> {
        if self.test_mode {
            Ok(())
        } else {
            Err(RegistrarError::SandboxDisabled)
        }
    }
}

#[async_trait]
impl Registrar for SandboxRegistrar {
    fn key(&self) -> &'static str {
        "sandbox"
    }

    async fn search_domain(&self, domain: &str) -> Result<DomainSearch, RegistrarError> {
        self.guard()?;
        Ok(DomainSearch {
            domain: domain.to_string(),
            available: true,
            price: Some(0.0),
        })
    }

    async fn register_domain(
        &self,
        domain: &str,
        registrant: &DomainRegistrant,
        _years: u32,
    ) -> Result<Registration, RegistrarError> {
        self.guard()?;
        registrant
            .validate()
            .map_err(|e| RegistrarError::InvalidContact(e.to_string()))?;
        // Same validation path as real providers, so contact bugs still
        // surface in tests.
        format_phone(&registrant.phone, "1")?;

        let order_id = format!("SBX-{}", Uuid::now_v7().simple());
        debug!(domain, order_id, "sandbox registration");
        Ok(Registration {
            order_id,
            charged_amount: None,
        })
    }

    async fn set_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
        _client_ip: Option<&str>,
    ) -> Result<(), RegistrarError> {
        self.guard()?;
        debug!(domain, ?nameservers, "sandbox nameserver update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domainforge_core::RegistrantId;

    fn registrant() -> DomainRegistrant {
        DomainRegistrant {
            id: RegistrantId::new(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-123-4567".into(),
            street: "1 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            postal_code: "SW1A".into(),
            country: "GB".into(),
            client_ip: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn refuses_everything_outside_test_mode() {
        let sandbox = SandboxRegistrar::new(false);
        assert!(matches!(
            sandbox.search_domain("example.com").await,
            Err(RegistrarError::SandboxDisabled)
        ));
        assert!(matches!(
            sandbox.register_domain("example.com", &registrant(), 1).await,
            Err(RegistrarError::SandboxDisabled)
        ));
        assert!(matches!(
            sandbox.set_nameservers("example.com", &[], None).await,
            Err(RegistrarError::SandboxDisabled)
        ));
    }

    #[tokio::test]
    async fn fabricates_registrations_in_test_mode() {
        let sandbox = SandboxRegistrar::new(true);

        let search = sandbox.search_domain("example.com").await.unwrap();
        assert!(search.available);

        let reg = sandbox
            .register_domain("example.com", &registrant(), 1)
            .await
            .unwrap();
        assert!(reg.order_id.starts_with("SBX-"));
    }
}
