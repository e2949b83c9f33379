//! Namecheap adapter.
//!
//! Namecheap's API is a flat query-string interface returning XML. The
//! handful of attributes the pipeline needs are pulled with a small
//! attribute scanner rather than a full XML parser.

use async_trait::async_trait;
use tracing::debug;

use domainforge_core::DomainRegistrant;

use crate::contact::format_phone;
use crate::error::RegistrarError;
use crate::provider::{DomainSearch, Registrar, Registration};

use super::REQUEST_TIMEOUT;

#[derive(Debug, Clone)]
pub struct NamecheapConfig {
    pub base_url: String,
    pub api_user: String,
    pub api_key: String,
    /// Namecheap requires the caller IP on every request.
    pub client_ip: String,
    pub default_calling_code: String,
}

pub struct NamecheapRegistrar {
    http: reqwest::Client,
    config: NamecheapConfig,
}

/// Extract `attr="…"` from the first `<element …>` occurrence.
fn xml_attr<'a>(xml: &'a str, element: &str, attr: &str) -> Option<&'a str> {
    let start = xml.find(&format!("<{element}"))?;
    let tail = &xml[start..];
    let end = tail.find('>')?;
    let tag = &tail[..end];

    let needle = format!("{attr}=\"");
    let value_start = tag.find(&needle)? + needle.len();
    let value_len = tag[value_start..].find('"')?;
    Some(&tag[value_start..value_start + value_len])
}

fn split_domain(domain: &str) -> Result<(&str, &str), RegistrarError> {
    domain
        .split_once('.')
        .ok_or_else(|| RegistrarError::InvalidContact(format!("not a registrable domain: {domain}")))
}

impl NamecheapRegistrar {
    pub fn new(config: NamecheapConfig) -> Result<Self, RegistrarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    /// Issue an API command with the mandatory auth/ip parameters.
    async fn command(
        &self,
        command: &str,
        params: &[(&str, &str)],
        client_ip: Option<&str>,
    ) -> Result<String, reqwest::Error> {
        let ip = client_ip.unwrap_or(&self.config.client_ip);
        let mut query: Vec<(&str, &str)> = vec![
            ("ApiUser", &self.config.api_user),
            ("ApiKey", &self.config.api_key),
            ("UserName", &self.config.api_user),
            ("ClientIp", ip),
            ("Command", command),
        ];
        query.extend_from_slice(params);

        self.http
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl Registrar for NamecheapRegistrar {
    fn key(&self) -> &'static str {
        "namecheap"
    }

    async fn search_domain(&self, domain: &str) -> Result<DomainSearch, RegistrarError> {
        let body = self
            .command("namecheap.domains.check", &[("DomainList", domain)], None)
            .await
            .map_err(|e| RegistrarError::Search {
                provider: "namecheap",
                message: e.to_string(),
            })?;

        if xml_attr(&body, "ApiResponse", "Status") == Some("ERROR") {
            return Err(RegistrarError::Search {
                provider: "namecheap",
                message: body,
            });
        }

        let available = match xml_attr(&body, "DomainCheckResult", "Available") {
            Some(v) => v.eq_ignore_ascii_case("true"),
            None => {
                return Err(RegistrarError::Search {
                    provider: "namecheap",
                    message: format!("malformed response: {body}"),
                });
            }
        };

        Ok(DomainSearch {
            domain: domain.to_string(),
            available,
            // Pricing needs a separate users.getPricing call; not exposed.
            price: None,
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
        let phone = format_phone(&registrant.phone, &self.config.default_calling_code)?;
        let years = years.to_string();

        let mut params: Vec<(&str, &str)> = vec![("DomainName", domain), ("Years", &years)];
        // Namecheap requires all four contact roles; they share one record.
        let roles = ["Registrant", "Tech", "Admin", "AuxBilling"];
        let mut owned: Vec<(String, &str)> = Vec::new();
        for role in roles {
            owned.push((format!("{role}FirstName"), &registrant.first_name));
            owned.push((format!("{role}LastName"), &registrant.last_name));
            owned.push((format!("{role}Address1"), &registrant.street));
            owned.push((format!("{role}City"), &registrant.city));
            owned.push((format!("{role}StateProvince"), &registrant.state));
            owned.push((format!("{role}PostalCode"), &registrant.postal_code));
            owned.push((format!("{role}Country"), &registrant.country));
            owned.push((format!("{role}Phone"), &phone));
            owned.push((format!("{role}EmailAddress"), &registrant.email));
        }
        params.extend(owned.iter().map(|(k, v)| (k.as_str(), *v)));

        debug!(domain, years = %years, "registering domain via Namecheap");

        let body = self
            .command(
                "namecheap.domains.create",
                &params,
                registrant.client_ip.as_deref(),
            )
            .await
            .map_err(|e| RegistrarError::Registration {
                provider: "namecheap",
                message: e.to_string(),
            })?;

        let registered = xml_attr(&body, "DomainCreateResult", "Registered")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if !registered {
            return Err(RegistrarError::Registration {
                provider: "namecheap",
                message: body,
            });
        }

        let order_id = xml_attr(&body, "DomainCreateResult", "OrderID")
            .ok_or_else(|| RegistrarError::Registration {
                provider: "namecheap",
                message: format!("registration succeeded but no OrderID: {body}"),
            })?
            .to_string();
        let charged_amount = xml_attr(&body, "DomainCreateResult", "ChargedAmount")
            .and_then(|v| v.parse::<f64>().ok());

        Ok(Registration {
            order_id,
            charged_amount,
        })
    }

    async fn set_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
        client_ip: Option<&str>,
    ) -> Result<(), RegistrarError> {
        let (sld, tld) = split_domain(domain)?;
        let list = nameservers.join(",");

        let body = self
            .command(
                "namecheap.domains.dns.setCustom",
                &[("SLD", sld), ("TLD", tld), ("Nameservers", &list)],
                client_ip,
            )
            .await
            .map_err(|e| RegistrarError::Nameservers {
                provider: "namecheap",
                message: e.to_string(),
            })?;

        let updated = xml_attr(&body, "DomainDNSSetCustomResult", "Updated")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if !updated {
            return Err(RegistrarError::Nameservers {
                provider: "namecheap",
                message: body,
            });
        }

        debug!(domain, ?nameservers, "nameservers updated via Namecheap");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK_RESPONSE: &str = r#"<?xml version="1.0"?>
<ApiResponse Status="OK">
  <CommandResponse Type="namecheap.domains.check">
    <DomainCheckResult Domain="example.com" Available="true" IsPremiumName="false" />
  </CommandResponse>
</ApiResponse>"#;

    const CREATE_RESPONSE: &str = r#"<?xml version="1.0"?>
<ApiResponse Status="OK">
  <CommandResponse Type="namecheap.domains.create">
    <DomainCreateResult Domain="example.com" Registered="true" ChargedAmount="10.87" OrderID="339" TransactionID="1380" />
  </CommandResponse>
</ApiResponse>"#;

    #[test]
    fn extracts_attributes_from_responses() {
        assert_eq!(
            xml_attr(CHECK_RESPONSE, "DomainCheckResult", "Available"),
            Some("true")
        );
        assert_eq!(
            xml_attr(CREATE_RESPONSE, "DomainCreateResult", "OrderID"),
            Some("339")
        );
        assert_eq!(
            xml_attr(CREATE_RESPONSE, "DomainCreateResult", "ChargedAmount"),
            Some("10.87")
        );
        assert_eq!(xml_attr(CREATE_RESPONSE, "DomainCheckResult", "Available"), None);
    }

    #[test]
    fn splits_registrable_domains() {
        assert_eq!(split_domain("example.com").unwrap(), ("example", "com"));
        assert_eq!(split_domain("shop.co.uk").unwrap(), ("shop", "co.uk"));
        assert!(split_domain("localhost").is_err());
    }
}
