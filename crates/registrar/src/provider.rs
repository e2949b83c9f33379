//! The registrar capability trait and its result shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use domainforge_core::DomainRegistrant;

use crate::error::RegistrarError;

/// Outcome of an availability search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSearch {
    pub domain: String,
    pub available: bool,
    /// Purchase price when the provider reports one.
    pub price: Option<f64>,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Provider order id; persisted into job metadata as the idempotency
    /// guard against duplicate purchases.
    pub order_id: String,
    pub charged_amount: Option<f64>,
}

/// Uniform capability set implemented by every registrar provider.
///
/// `register_domain` must be treated as at-most-once per real registration.
/// The pipeline guarantees this via the persisted order id, not via
/// registrar-side idempotency keys, because not all providers support them.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Provider key, as used for selection and stored in job metadata.
    fn key(&self) -> &'static str;

    /// Check whether `domain` can be purchased.
    ///
    /// Errors must propagate; availability is never assumed on failure.
    async fn search_domain(&self, domain: &str) -> Result<DomainSearch, RegistrarError>;

    /// Purchase `domain` for `years` on behalf of `registrant`.
    async fn register_domain(
        &self,
        domain: &str,
        registrant: &DomainRegistrant,
        years: u32,
    ) -> Result<Registration, RegistrarError>;

    /// Replace the domain's delegated nameservers.
    async fn set_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
        client_ip: Option<&str>,
    ) -> Result<(), RegistrarError>;
}
