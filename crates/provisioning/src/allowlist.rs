//! Reverse-proxy allowlist client.
//!
//! The proxy only terminates TLS and routes traffic for domains on its
//! allowlist; adding the domain is the pipeline's terminal step.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ProvisionError;

/// Operations the job engine needs from the allowlist service.
#[async_trait]
pub trait ProxyAllowlist: Send + Sync {
    async fn add_domain(&self, domain: &str) -> Result<bool, ProvisionError>;

    async fn remove_domain(&self, domain: &str) -> Result<bool, ProvisionError>;

    /// Connectivity probe; never errors, a dead service is just `false`.
    async fn health(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP client for the Caddy-fronted allowlist service.
pub struct CaddyClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CaddyClient {
    /// All calls carry a fixed short timeout so a hung proxy admin endpoint
    /// cannot stall the worker.
    const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token,
        })
    }

    fn token(&self) -> Result<&str, ProvisionError> {
        match self.token.as_deref() {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(ProvisionError::MissingToken),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<(), ProvisionError> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProvisionError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl ProxyAllowlist for CaddyClient {
    async fn add_domain(&self, domain: &str) -> Result<bool, ProvisionError> {
        let token = self.token()?;
        let resp = self
            .http
            .post(format!("{}/allowlist", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "domain": domain }))
            .send()
            .await?;
        Self::check(resp).await?;

        debug!(domain, "domain added to proxy allowlist");
        Ok(true)
    }

    async fn remove_domain(&self, domain: &str) -> Result<bool, ProvisionError> {
        let token = self.token()?;
        let resp = self
            .http
            .delete(format!("{}/allowlist/{domain}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(resp).await?;

        debug!(domain, "domain removed from proxy allowlist");
        Ok(true)
    }

    async fn health(&self) -> bool {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() => matches!(
                r.json::<HealthResponse>().await,
                Ok(h) if h.status == "ok"
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_token_fails_loudly() {
        let client = CaddyClient::new("http://127.0.0.1:1", None).unwrap();
        assert!(matches!(
            client.add_domain("example.com").await,
            Err(ProvisionError::MissingToken)
        ));
        assert!(matches!(
            client.remove_domain("example.com").await,
            Err(ProvisionError::MissingToken)
        ));

        let blank = CaddyClient::new("http://127.0.0.1:1", Some(String::new())).unwrap();
        assert!(matches!(
            blank.add_domain("example.com").await,
            Err(ProvisionError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn health_is_false_when_unreachable() {
        // Reserved port; the connection is refused immediately.
        let client = CaddyClient::new("http://127.0.0.1:1", Some("tok".into())).unwrap();
        assert!(!client.health().await);
    }
}
