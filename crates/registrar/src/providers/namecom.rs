//! name.com adapter (production default).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use domainforge_core::DomainRegistrant;

use crate::contact::format_phone;
use crate::error::RegistrarError;
use crate::provider::{DomainSearch, Registrar, Registration};

use super::REQUEST_TIMEOUT;

/// name.com API credentials and endpoint.
#[derive(Debug, Clone)]
pub struct NamecomConfig {
    /// `https://api.name.com` in production, `https://api.dev.name.com`
    /// against the name.com sandbox.
    pub base_url: String,
    pub username: String,
    pub token: String,
    /// Country calling code applied when normalizing registrant phones.
    pub default_calling_code: String,
}

pub struct NamecomRegistrar {
    http: reqwest::Client,
    config: NamecomConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    domain_name: String,
    #[serde(default)]
    purchasable: bool,
    #[serde(default)]
    purchase_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDomainResponse {
    order: i64,
    #[serde(default)]
    total_paid: Option<f64>,
}

impl NamecomRegistrar {
    pub fn new(config: NamecomConfig) -> Result<Self, RegistrarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    fn contact(&self, registrant: &DomainRegistrant) -> Result<serde_json::Value, RegistrarError> {
        let phone = format_phone(&registrant.phone, &self.config.default_calling_code)?;
        Ok(json!({
            "firstName": registrant.first_name,
            "lastName": registrant.last_name,
            "email": registrant.email,
            "phone": phone,
            "address1": registrant.street,
            "city": registrant.city,
            "state": registrant.state,
            "zip": registrant.postal_code,
            "country": registrant.country,
        }))
    }

    async fn error_body(resp: reqwest::Response) -> String {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        format!("HTTP {status}: {body}")
    }
}

#[async_trait]
impl Registrar for NamecomRegistrar {
    fn key(&self) -> &'static str {
        "namecom"
    }

    async fn search_domain(&self, domain: &str) -> Result<DomainSearch, RegistrarError> {
        let url = format!("{}/v4/domains:checkAvailability", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.token))
            .json(&json!({ "domainNames": [domain] }))
            .send()
            .await
            .map_err(|e| RegistrarError::Search {
                provider: "namecom",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Search {
                provider: "namecom",
                message: Self::error_body(resp).await,
            });
        }

        let parsed: SearchResponse = resp.json().await.map_err(|e| RegistrarError::Search {
            provider: "namecom",
            message: format!("malformed response: {e}"),
        })?;

        let result = parsed
            .results
            .into_iter()
            .find(|r| r.domain_name.eq_ignore_ascii_case(domain));

        match result {
            Some(r) => Ok(DomainSearch {
                domain: r.domain_name,
                available: r.purchasable,
                price: r.purchase_price,
            }),
            // Absent from the results means not purchasable, not an error.
            None => Ok(DomainSearch {
                domain: domain.to_string(),
                available: false,
                price: None,
            }),
        }
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

        let url = format!("{}/v4/domains", self.config.base_url);
        let body = json!({
            "domain": {
                "domainName": domain,
                "contacts": {
                    "registrant": &contact,
                    "admin": &contact,
                    "tech": &contact,
                    "billing": &contact,
                },
            },
            "years": years,
        });

        debug!(domain, years, "registering domain via name.com");

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrarError::Registration {
                provider: "namecom",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Registration {
                provider: "namecom",
                message: Self::error_body(resp).await,
            });
        }

        let parsed: CreateDomainResponse =
            resp.json().await.map_err(|e| RegistrarError::Registration {
                provider: "namecom",
                message: format!("malformed response: {e}"),
            })?;

        Ok(Registration {
            order_id: parsed.order.to_string(),
            charged_amount: parsed.total_paid,
        })
    }

    async fn set_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
        _client_ip: Option<&str>,
    ) -> Result<(), RegistrarError> {
        let url = format!("{}/v4/domains/{domain}:setNameservers", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.token))
            .json(&json!({ "nameservers": nameservers }))
            .send()
            .await
            .map_err(|e| RegistrarError::Nameservers {
                provider: "namecom",
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(RegistrarError::Nameservers {
                provider: "namecom",
                message: Self::error_body(resp).await,
            });
        }

        debug!(domain, ?nameservers, "nameservers updated via name.com");
        Ok(())
    }
}
