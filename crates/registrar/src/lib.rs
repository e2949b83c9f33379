//! `domainforge-registrar`: uniform interface over domain registrars.
//!
//! Exposes the capability set `{search_domain, register_domain,
//! set_nameservers}` behind the [`Registrar`] trait, with one adapter per
//! provider (name.com is the production default; GoDaddy, Namecheap, and a
//! test-mode sandbox are alternates). Providers are selected by string key
//! through [`RegistrarSelector`].

pub mod contact;
pub mod error;
pub mod provider;
pub mod providers;
pub mod selector;

pub use contact::format_phone;
pub use error::RegistrarError;
pub use provider::{DomainSearch, Registrar, Registration};
pub use providers::{
    GodaddyConfig, GodaddyRegistrar, NamecheapConfig, NamecheapRegistrar, NamecomConfig,
    NamecomRegistrar, SandboxRegistrar,
};
pub use selector::{ProviderKey, RegistrarConfig, RegistrarSelector};
