//! GoDaddy adapter.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use domainforge_core::DomainRegistrant;

use crate::contact::format_phone;
use crate::error::RegistrarError;
use crate::provider::{DomainSearch, Registrar, Registration};

use super::REQUEST_TIMEOUT;

#[derive(Debug, Clone)]
pub struct GodaddyConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub default_calling_code: String,
}

pub struct GodaddyRegistrar {
    http: reqwest::Client,
    config: GodaddyConfig,
}

#[derive(Debug, Deserialize)]
struct AvailableResponse {
    available: bool,
    /// GoDaddy prices are reported in micro-units of the currency.
    #[serde(default)]
    price: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseResponse {
    order_id: i64,
    #[serde(default)]
    total: Option<i64>,
}

impl GodaddyRegistrar {
    pub fn new(config: GodaddyConfig) -> Result<Self, RegistrarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    fn auth_header(&self) -> String {
        format!("sso-key {}:{}", self.config.api_key, self.config.api_secret)
    }

    fn contact(&self, registrant: &DomainRegistrant) -> Result<serde_json::Value, RegistrarError> {
        let phone = format_phone(&registrant.phone, &self.config.default_calling_code)?;
        Ok(json!({
            "nameFirst": registrant.first_name,
            "nameLast": registrant.last_name,
            "email": registrant.email,
            "phone": phone,
            "addressMailing": {
                "address1": registrant.street,
                "city": registrant.city,
                "state": registrant.state,
                "postalCode": registrant.postal_code,
                "country": registrant.country,
            },
        }))
    }

    async fn error_body(resp: reqwest::Response) -> String {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        format!("HTTP {status}: {body}")
    }
}

#[async_trait]
impl Registrar for GodaddyRegistrar {
    fn key(&self) -> &'static str {
        "godaddy"
    }

    async fn search_domain(&self, domain: &str) -> Result<DomainSearch, RegistrarError> {
        let url = format!("{}/v1/domains/available", self.config.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("domain", domain)])
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| RegistrarError::Search {
                provider: "godaddy",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Search {
                provider: "godaddy",
                message: Self::error_body(resp).await,
            });
        }

        let parsed: AvailableResponse = resp.json().await.map_err(|e| RegistrarError::Search {
            provider: "godaddy",
            message: format!("malformed response: {e}"),
        })?;

        Ok(DomainSearch {
            domain: domain.to_string(),
            available: parsed.available,
            price: parsed.price.map(|micros| micros as f64 / 1_000_000.0),
        })
    }

    async fn register_domain(
        &self,
        domain: &str,
        registrant: &DomainRegistrant,
        years: u32,
    ) -> Result<Registration, RegistrarError> {
        registrant
            .validate()
            .map_err(|e| RegistrarError::InvalidContact(e.to_string()))?;
        let contact = self.contact(registrant)?;

        // GoDaddy requires explicit agreement consent, attributed to the
        // requester IP when we captured one.
        let agreed_by = registrant.client_ip.as_deref().unwrap_or("127.0.0.1");
        let body = json!({
            "domain": domain,
            "period": years,
            "renewAuto": false,
            "privacy": false,
            "consent": {
                "agreementKeys": ["DNRA"],
                "agreedBy": agreed_by,
                "agreedAt": Utc::now().to_rfc3339(),
            },
            "contactRegistrant": &contact,
            "contactAdmin": &contact,
            "contactTech": &contact,
            "contactBilling": &contact,
        });

        debug!(domain, years, "registering domain via GoDaddy");

        let url = format!("{}/v1/domains/purchase", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrarError::Registration {
                provider: "godaddy",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Registration {
                provider: "godaddy",
                message: Self::error_body(resp).await,
            });
        }

        let parsed: PurchaseResponse =
            resp.json().await.map_err(|e| RegistrarError::Registration {
                provider: "godaddy",
                message: format!("malformed response: {e}"),
            })?;

        Ok(Registration {
            order_id: parsed.order_id.to_string(),
            charged_amount: parsed.total.map(|micros| micros as f64 / 1_000_000.0),
        })
    }

    async fn set_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
        _client_ip: Option<&str>,
    ) -> Result<(), RegistrarError> {
        let url = format!("{}/v1/domains/{domain}", self.config.base_url);
        let resp = self
            .http
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(&json!({ "nameServers": nameservers }))
            .send()
            .await
            .map_err(|e| RegistrarError::Nameservers {
                provider: "godaddy",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Nameservers {
                provider: "godaddy",
                message: Self::error_body(resp).await,
            });
        }

        debug!(domain, ?nameservers, "nameservers updated via GoDaddy");
        Ok(())
    }
}
