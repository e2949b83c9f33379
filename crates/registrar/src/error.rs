//! Registrar error model.

use thiserror::Error;

/// Errors surfaced by registrar providers.
///
/// Provider-specific failures are wrapped into the generic per-capability
/// variants; callers must never interpret an error as "available" or
/// "registered".
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("domain search failed ({provider}): {message}")]
    Search {
        provider: &'static str,
        message: String,
    },

    #[error("domain registration failed ({provider}): {message}")]
    Registration {
        provider: &'static str,
        message: String,
    },

    #[error("nameserver update failed ({provider}): {message}")]
    Nameservers {
        provider: &'static str,
        message: String,
    },

    /// Contact data a registrar would reject (e.g. malformed phone number).
    #[error("invalid contact data: {0}")]
    InvalidContact(String),

    #[error("unknown registrar provider: {0}")]
    UnknownProvider(String),

    /// The provider key is known but its credentials are not configured.
    #[error("registrar provider not configured: {0}")]
    NotConfigured(&'static str),

    /// The sandbox provider refuses to answer outside explicit test mode,
    /// so "assume available" behavior can never leak into production.
    #[error("sandbox registrar invoked outside test mode")]
    SandboxDisabled,

    #[error("registrar transport error: {0}")]
    Http(#[from] reqwest::Error),
}
