//! DNS/CDN provider client (Cloudflare API shape).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ProvisionError;

/// A DNS/CDN zone as returned by zone creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    /// Nameservers the registrar must be pointed at.
    pub nameservers: Vec<String>,
}

/// Zone activation status, polled while registrar delegation propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneStatus {
    Active,
    Pending,
    Other(String),
}

impl ZoneStatus {
    fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "pending" | "initializing" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Certificate issuance status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SslStatus {
    Active,
    Pending,
    Other(String),
}

impl SslStatus {
    fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "pending_validation" | "pending_issuance" | "pending_deployment" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Desired state for one DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Record type (`A`, `CNAME`, ...).
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
}

/// What `create_or_update_record` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Operations the job engine needs from the DNS/CDN provider.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn add_zone(&self, domain: &str) -> Result<Zone, ProvisionError>;

    async fn zone_status(&self, zone_id: &str) -> Result<ZoneStatus, ProvisionError>;

    async fn ssl_status(&self, zone_id: &str) -> Result<SslStatus, ProvisionError>;

    async fn enable_universal_ssl(&self, zone_id: &str) -> Result<(), ProvisionError>;

    /// Idempotent upsert keyed on `(type, name)`: creates when missing,
    /// updates in place when content/proxied differ, no-ops when the record
    /// already matches.
    async fn create_or_update_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> Result<RecordOutcome, ProvisionError>;

    /// Override the host header sent to the origin for this zone.
    async fn set_origin_host_header(
        &self,
        zone_id: &str,
        hostname: &str,
    ) -> Result<(), ProvisionError>;

    /// Redirect `www.<domain>` to the apex.
    async fn create_www_redirect(&self, zone_id: &str, domain: &str)
        -> Result<(), ProvisionError>;
}

/// Decide what to do with an existing `(type, name)` match. Pure so the
/// upsert contract is testable without HTTP.
fn upsert_action(existing: Option<&ExistingRecord>, desired: &DnsRecord) -> UpsertAction {
    match existing {
        None => UpsertAction::Create,
        Some(found) if found.content == desired.content && found.proxied == desired.proxied => {
            UpsertAction::Noop
        }
        Some(found) => UpsertAction::Update(found.id.clone()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UpsertAction {
    Create,
    Update(String),
    Noop,
}

#[derive(Debug, Deserialize)]
struct ExistingRecord {
    id: String,
    content: String,
    #[serde(default)]
    proxied: bool,
}

/// Cloudflare response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    name_servers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SslVerification {
    #[serde(default)]
    certificate_status: Option<String>,
}

/// Cloudflare-backed [`DnsProvider`].
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl CloudflareClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(8))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_token: api_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn unwrap_envelope<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ProvisionError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| ProvisionError::UnexpectedResponse(e.to_string()))?;
        if !envelope.success {
            return Err(ProvisionError::UnexpectedResponse(format!(
                "provider reported failure: {:?}",
                envelope.errors
            )));
        }
        envelope
            .result
            .ok_or_else(|| ProvisionError::UnexpectedResponse("missing result".to_string()))
    }
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    async fn add_zone(&self, domain: &str) -> Result<Zone, ProvisionError> {
        let resp = self
            .http
            .post(self.url("/zones"))
            .bearer_auth(&self.api_token)
            .json(&json!({ "name": domain }))
            .send()
            .await?;
        let zone: ZoneResult = Self::unwrap_envelope(resp).await?;

        debug!(domain, zone_id = %zone.id, "zone created");
        Ok(Zone {
            id: zone.id,
            nameservers: zone.name_servers,
        })
    }

    async fn zone_status(&self, zone_id: &str) -> Result<ZoneStatus, ProvisionError> {
        let resp = self
            .http
            .get(self.url(&format!("/zones/{zone_id}")))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let zone: ZoneResult = Self::unwrap_envelope(resp).await?;
        let status = zone
            .status
            .ok_or_else(|| ProvisionError::UnexpectedResponse("zone has no status".to_string()))?;
        Ok(ZoneStatus::parse(&status))
    }

    async fn ssl_status(&self, zone_id: &str) -> Result<SslStatus, ProvisionError> {
        let resp = self
            .http
            .get(self.url(&format!("/zones/{zone_id}/ssl/verification")))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let verifications: Vec<SslVerification> = Self::unwrap_envelope(resp).await?;
        let status = verifications
            .first()
            .and_then(|v| v.certificate_status.clone())
            .ok_or_else(|| {
                ProvisionError::UnexpectedResponse("no certificate status".to_string())
            })?;
        Ok(SslStatus::parse(&status))
    }

    async fn enable_universal_ssl(&self, zone_id: &str) -> Result<(), ProvisionError> {
        let resp = self
            .http
            .patch(self.url(&format!("/zones/{zone_id}/ssl/universal/settings")))
            .bearer_auth(&self.api_token)
            .json(&json!({ "enabled": true }))
            .send()
            .await?;
        let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(())
    }

    async fn create_or_update_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> Result<RecordOutcome, ProvisionError> {
        // Look for an existing record with the same type+name.
        let resp = self
            .http
            .get(self.url(&format!("/zones/{zone_id}/dns_records")))
            .query(&[("type", record.record_type.as_str()), ("name", record.name.as_str())])
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let existing: Vec<ExistingRecord> = Self::unwrap_envelope(resp).await?;

        let body = json!({
            "type": record.record_type,
            "name": record.name,
            "content": record.content,
            "proxied": record.proxied,
            "ttl": 1,
        });

        match upsert_action(existing.first(), record) {
            UpsertAction::Noop => {
                debug!(zone_id, name = %record.name, "record already correct");
                Ok(RecordOutcome::Unchanged)
            }
            UpsertAction::Update(record_id) => {
                let resp = self
                    .http
                    .put(self.url(&format!("/zones/{zone_id}/dns_records/{record_id}")))
                    .bearer_auth(&self.api_token)
                    .json(&body)
                    .send()
                    .await?;
                let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
                debug!(zone_id, name = %record.name, "record updated");
                Ok(RecordOutcome::Updated)
            }
            UpsertAction::Create => {
                let resp = self
                    .http
                    .post(self.url(&format!("/zones/{zone_id}/dns_records")))
                    .bearer_auth(&self.api_token)
                    .json(&body)
                    .send()
                    .await?;
                let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
                debug!(zone_id, name = %record.name, "record created");
                Ok(RecordOutcome::Created)
            }
        }
    }

    async fn set_origin_host_header(
        &self,
        zone_id: &str,
        hostname: &str,
    ) -> Result<(), ProvisionError> {
        let body = json!({
            "targets": [{
                "target": "url",
                "constraint": { "operator": "matches", "value": format!("{hostname}/*") },
            }],
            "actions": [{ "id": "host_header_override", "value": hostname }],
            "status": "active",
        });
        let resp = self
            .http
            .post(self.url(&format!("/zones/{zone_id}/pagerules")))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(())
    }

    async fn create_www_redirect(
        &self,
        zone_id: &str,
        domain: &str,
    ) -> Result<(), ProvisionError> {
        let body = json!({
            "targets": [{
                "target": "url",
                "constraint": { "operator": "matches", "value": format!("www.{domain}/*") },
            }],
            "actions": [{
                "id": "forwarding_url",
                "value": { "url": format!("https://{domain}/$1"), "status_code": 301 },
            }],
            "status": "active",
        });
        let resp = self
            .http
            .post(self.url(&format!("/zones/{zone_id}/pagerules")))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        let _: serde_json::Value = Self::unwrap_envelope(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired() -> DnsRecord {
        DnsRecord {
            record_type: "CNAME".into(),
            name: "example.com".into(),
            content: "origin.example.net".into(),
            proxied: true,
        }
    }

    #[test]
    fn missing_record_is_created() {
        assert_eq!(upsert_action(None, &desired()), UpsertAction::Create);
    }

    #[test]
    fn matching_record_is_left_alone() {
        let existing = ExistingRecord {
            id: "rec1".into(),
            content: "origin.example.net".into(),
            proxied: true,
        };
        assert_eq!(upsert_action(Some(&existing), &desired()), UpsertAction::Noop);
    }

    #[test]
    fn drifted_record_is_updated_in_place() {
        let stale_content = ExistingRecord {
            id: "rec1".into(),
            content: "old-origin.example.net".into(),
            proxied: true,
        };
        assert_eq!(
            upsert_action(Some(&stale_content), &desired()),
            UpsertAction::Update("rec1".into())
        );

        let stale_proxy = ExistingRecord {
            id: "rec2".into(),
            content: "origin.example.net".into(),
            proxied: false,
        };
        assert_eq!(
            upsert_action(Some(&stale_proxy), &desired()),
            UpsertAction::Update("rec2".into())
        );
    }

    #[test]
    fn status_parsing() {
        assert_eq!(ZoneStatus::parse("active"), ZoneStatus::Active);
        assert_eq!(ZoneStatus::parse("pending"), ZoneStatus::Pending);
        assert_eq!(ZoneStatus::parse("moved"), ZoneStatus::Other("moved".into()));

        assert_eq!(SslStatus::parse("active"), SslStatus::Active);
        assert_eq!(SslStatus::parse("pending_validation"), SslStatus::Pending);
    }
}
