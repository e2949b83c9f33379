//! Provisioning client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The allowlist service's bearer token is absent from configuration.
    ///
    /// This is raised at call time instead of silently no-opping: a silent
    /// no-op would let the pipeline report success for a domain the proxy
    /// will never serve.
    #[error("allowlist auth token is not configured")]
    MissingToken,

    #[error("provider API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    #[error("provisioning transport error: {0}")]
    Http(#[from] reqwest::Error),
}
