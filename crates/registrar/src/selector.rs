//! Provider selection.
//!
//! Call sites hold a [`RegistrarSelector`] and ask for a provider by string
//! key (usually the `registrar_provider` recorded in job metadata); absent a
//! key, the configured default is used.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::error::RegistrarError;
use crate::provider::Registrar;
use crate::providers::godaddy::{GodaddyConfig, GodaddyRegistrar};
use crate::providers::namecheap::{NamecheapConfig, NamecheapRegistrar};
use crate::providers::namecom::{NamecomConfig, NamecomRegistrar};
use crate::providers::sandbox::SandboxRegistrar;

/// Known provider keys.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKey {
    Namecom,
    Godaddy,
    Namecheap,
    Sandbox,
}

impl ProviderKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namecom => "namecom",
            Self::Godaddy => "godaddy",
            Self::Namecheap => "namecheap",
            Self::Sandbox => "sandbox",
        }
    }
}

impl core::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKey {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "namecom" => Ok(Self::Namecom),
            "godaddy" => Ok(Self::Godaddy),
            "namecheap" => Ok(Self::Namecheap),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(RegistrarError::UnknownProvider(other.to_string())),
        }
    }
}

/// Registrar configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    pub default_provider: ProviderKey,
    pub namecom: Option<NamecomConfig>,
    pub godaddy: Option<GodaddyConfig>,
    pub namecheap: Option<NamecheapConfig>,
    /// Enables the sandbox provider. Never set this in production.
    pub sandbox_test_mode: bool,
}

impl RegistrarConfig {
    /// Read provider credentials from environment variables. Providers with
    /// missing credentials are simply absent from the selector.
    pub fn from_env() -> Self {
        let default_provider = std::env::var("REGISTRAR_DEFAULT_PROVIDER")
            .ok()
            .and_then(|v| match v.parse::<ProviderKey>() {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!(value = %v, "unknown REGISTRAR_DEFAULT_PROVIDER; using namecom");
                    None
                }
            })
            .unwrap_or(ProviderKey::Namecom);

        let calling_code =
            std::env::var("REGISTRAR_DEFAULT_CALLING_CODE").unwrap_or_else(|_| "1".to_string());

        let namecom = match (std::env::var("NAMECOM_USERNAME"), std::env::var("NAMECOM_TOKEN")) {
            (Ok(username), Ok(token)) => Some(NamecomConfig {
                base_url: std::env::var("NAMECOM_API_URL")
                    .unwrap_or_else(|_| "https://api.name.com".to_string()),
                username,
                token,
                default_calling_code: calling_code.clone(),
            }),
            _ => None,
        };

        let godaddy = match (std::env::var("GODADDY_API_KEY"), std::env::var("GODADDY_API_SECRET"))
        {
            (Ok(api_key), Ok(api_secret)) => Some(GodaddyConfig {
                base_url: std::env::var("GODADDY_API_URL")
                    .unwrap_or_else(|_| "https://api.godaddy.com".to_string()),
                api_key,
                api_secret,
                default_calling_code: calling_code.clone(),
            }),
            _ => None,
        };

        let namecheap = match (
            std::env::var("NAMECHEAP_API_USER"),
            std::env::var("NAMECHEAP_API_KEY"),
            std::env::var("NAMECHEAP_CLIENT_IP"),
        ) {
            (Ok(api_user), Ok(api_key), Ok(client_ip)) => Some(NamecheapConfig {
                base_url: std::env::var("NAMECHEAP_API_URL")
                    .unwrap_or_else(|_| "https://api.namecheap.com/xml.response".to_string()),
                api_user,
                api_key,
                client_ip,
                default_calling_code: calling_code,
            }),
            _ => None,
        };

        Self {
            default_provider,
            namecom,
            godaddy,
            namecheap,
            sandbox_test_mode: std::env::var("REGISTRAR_SANDBOX_TEST_MODE")
                .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        }
    }
}

/// String-keyed registrar factory.
#[derive(Clone)]
pub struct RegistrarSelector {
    providers: HashMap<ProviderKey, Arc<dyn Registrar>>,
    default: ProviderKey,
}

impl RegistrarSelector {
    /// Empty selector with a default key; used by tests that register
    /// doubles explicitly.
    pub fn new(default: ProviderKey) -> Self {
        Self {
            providers: HashMap::new(),
            default,
        }
    }

    /// Build the selector from configuration, instantiating every provider
    /// whose credentials are present.
    pub fn from_config(config: &RegistrarConfig) -> Result<Self, RegistrarError> {
        let mut selector = Self::new(config.default_provider);

        if let Some(cfg) = &config.namecom {
            selector.register(ProviderKey::Namecom, Arc::new(NamecomRegistrar::new(cfg.clone())?));
        }
        if let Some(cfg) = &config.godaddy {
            selector.register(ProviderKey::Godaddy, Arc::new(GodaddyRegistrar::new(cfg.clone())?));
        }
        if let Some(cfg) = &config.namecheap {
            selector.register(
                ProviderKey::Namecheap,
                Arc::new(NamecheapRegistrar::new(cfg.clone())?),
            );
        }
        if config.sandbox_test_mode {
            warn!("sandbox registrar enabled; all registrations are fake");
            selector.register(ProviderKey::Sandbox, Arc::new(SandboxRegistrar::new(true)));
        }

        Ok(selector)
    }

    pub fn register(&mut self, key: ProviderKey, provider: Arc<dyn Registrar>) {
        self.providers.insert(key, provider);
    }

    /// Resolve a provider by optional string key, falling back to the
    /// configured default.
    pub fn get(&self, key: Option<&str>) -> Result<Arc<dyn Registrar>, RegistrarError> {
        let key = match key {
            Some(s) => s.parse::<ProviderKey>()?,
            None => self.default,
        };
        self.providers.get(&key).cloned().ok_or_else(|| {
            RegistrarError::NotConfigured(key.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_rejected() {
        let selector = RegistrarSelector::new(ProviderKey::Namecom);
        assert!(matches!(
            selector.get(Some("enom")),
            Err(RegistrarError::UnknownProvider(_))
        ));
    }

    #[test]
    fn known_but_unconfigured_provider_errors() {
        let selector = RegistrarSelector::new(ProviderKey::Namecom);
        assert!(matches!(
            selector.get(None),
            Err(RegistrarError::NotConfigured("namecom"))
        ));
    }

    #[test]
    fn default_and_explicit_lookup() {
        let mut selector = RegistrarSelector::new(ProviderKey::Sandbox);
        selector.register(ProviderKey::Sandbox, Arc::new(SandboxRegistrar::new(true)));

        assert_eq!(selector.get(None).unwrap().key(), "sandbox");
        assert_eq!(selector.get(Some("sandbox")).unwrap().key(), "sandbox");
    }
}
