//! Pipeline step vocabulary.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Current stage within a job's fixed pipeline.
///
/// The main sequence is:
///
/// ```text
/// register -> configure_namecom_dns -> add_to_caddy -> complete
/// ```
///
/// A legacy branch (`configure_dns -> provision_ssl`) exists for domains
/// provisioned through the CDN's own nameservers; both branches converge on
/// `add_to_caddy`. The serialized names are the literal strings persisted in
/// storage, so renaming a variant is a data migration, not a refactor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionStep {
    /// Register the domain with the configured registrar.
    #[serde(rename = "register")]
    Register,

    /// Point the registrar's nameservers at the reverse proxy.
    #[serde(rename = "configure_namecom_dns")]
    ConfigureNamecomDns,

    /// Legacy branch: create DNS records once the CDN zone is active.
    #[serde(rename = "configure_dns")]
    ConfigureDns,

    /// Legacy branch: enable Universal SSL and wait for the certificate.
    #[serde(rename = "provision_ssl")]
    ProvisionSsl,

    /// Add the domain to the reverse proxy's TLS allowlist.
    ///
    /// `add_to_railway` is a deprecated alias kept so jobs created before
    /// the proxy migration keep making forward progress.
    #[serde(rename = "add_to_caddy", alias = "add_to_railway")]
    AddToCaddy,

    /// Terminal success marker.
    #[serde(rename = "complete")]
    Complete,
}

impl ProvisionStep {
    /// The literal step name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ConfigureNamecomDns => "configure_namecom_dns",
            Self::ConfigureDns => "configure_dns",
            Self::ProvisionSsl => "provision_ssl",
            Self::AddToCaddy => "add_to_caddy",
            Self::Complete => "complete",
        }
    }

    /// Ordinal position in the pipeline, used to assert forward-only
    /// movement. The two DNS branches are parallel and share a position.
    pub fn position(&self) -> u8 {
        match self {
            Self::Register => 0,
            Self::ConfigureNamecomDns | Self::ConfigureDns => 1,
            Self::ProvisionSsl => 2,
            Self::AddToCaddy => 3,
            Self::Complete => 4,
        }
    }

    /// Whether `next` is a legal successor of `self` (same-step reschedules
    /// are allowed; regression is not).
    pub fn allows_transition_to(&self, next: ProvisionStep) -> bool {
        next.position() >= self.position()
    }
}

impl core::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisionStep {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(Self::Register),
            "configure_namecom_dns" => Ok(Self::ConfigureNamecomDns),
            "configure_dns" => Ok(Self::ConfigureDns),
            "provision_ssl" => Ok(Self::ProvisionSsl),
            // Deprecated alias from before the proxy migration.
            "add_to_caddy" | "add_to_railway" => Ok(Self::AddToCaddy),
            "complete" => Ok(Self::Complete),
            other => Err(DomainError::validation(format!("unknown step: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_literal_step_names() {
        for step in [
            ProvisionStep::Register,
            ProvisionStep::ConfigureNamecomDns,
            ProvisionStep::ConfigureDns,
            ProvisionStep::ProvisionSsl,
            ProvisionStep::AddToCaddy,
            ProvisionStep::Complete,
        ] {
            let parsed: ProvisionStep = step.as_str().parse().unwrap();
            assert_eq!(parsed, step);

            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
        }
    }

    #[test]
    fn railway_alias_maps_to_caddy() {
        assert_eq!(
            "add_to_railway".parse::<ProvisionStep>().unwrap(),
            ProvisionStep::AddToCaddy
        );
        let parsed: ProvisionStep = serde_json::from_str("\"add_to_railway\"").unwrap();
        assert_eq!(parsed, ProvisionStep::AddToCaddy);
    }

    #[test]
    fn unknown_step_is_rejected() {
        assert!("verify_dns".parse::<ProvisionStep>().is_err());
    }

    #[test]
    fn steps_only_move_forward() {
        assert!(ProvisionStep::Register.allows_transition_to(ProvisionStep::ConfigureNamecomDns));
        assert!(ProvisionStep::ConfigureDns.allows_transition_to(ProvisionStep::ConfigureDns));
        assert!(ProvisionStep::ProvisionSsl.allows_transition_to(ProvisionStep::AddToCaddy));
        assert!(!ProvisionStep::AddToCaddy.allows_transition_to(ProvisionStep::Register));
    }
}
