//! Pipeline configuration.

use std::time::Duration;

use tracing::warn;

/// Tunables for the poller and step handlers, read from the environment
/// with logged fallbacks.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Poller tick interval.
    pub poll_interval: Duration,
    /// Upper bound on jobs processed per tick.
    pub batch_size: u32,
    /// Nameservers the registrar is pointed at after registration.
    pub nameservers: Vec<String>,
    /// Origin hostname that proxied DNS records resolve to.
    pub origin_host: String,
    /// Registration term submitted to the registrar.
    pub registration_years: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 20,
            nameservers: vec![
                "ns1.cloudflare.com".to_string(),
                "ns2.cloudflare.com".to_string(),
            ],
            origin_host: "origin.domainforge.app".to_string(),
            registration_years: 1,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_interval = env_u64("PIPELINE_POLL_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let batch_size = env_u64("PIPELINE_BATCH_SIZE")
            .map(|v| v as u32)
            .unwrap_or(defaults.batch_size);

        let nameservers = match std::env::var("PIPELINE_NAMESERVERS") {
            Ok(raw) => {
                let parsed: Vec<String> = raw
                    .split(',')
                    .map(|ns| ns.trim().to_string())
                    .filter(|ns| !ns.is_empty())
                    .collect();
                if parsed.is_empty() {
                    warn!("PIPELINE_NAMESERVERS is empty; using defaults");
                    defaults.nameservers
                } else {
                    parsed
                }
            }
            Err(_) => {
                warn!("PIPELINE_NAMESERVERS not set; using defaults");
                defaults.nameservers
            }
        };

        let origin_host = std::env::var("PIPELINE_ORIGIN_HOST").unwrap_or_else(|_| {
            warn!("PIPELINE_ORIGIN_HOST not set; using default origin");
            defaults.origin_host
        });

        let registration_years = env_u64("PIPELINE_REGISTRATION_YEARS")
            .map(|v| v as u32)
            .unwrap_or(defaults.registration_years);

        Self {
            poll_interval,
            batch_size,
            nameservers,
            origin_host,
            registration_years,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = %raw, variable = name, "unparseable numeric setting; using default");
            None
        }
    }
}
