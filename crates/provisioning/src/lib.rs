//! `domainforge-provisioning`: thin clients over the external systems the
//! pipeline drives: the DNS/CDN provider and the reverse-proxy allowlist
//! service. Each client exposes only the operations the job engine needs.

pub mod allowlist;
pub mod dns;
pub mod error;

pub use allowlist::{CaddyClient, ProxyAllowlist};
pub use dns::{
    CloudflareClient, DnsProvider, DnsRecord, RecordOutcome, SslStatus, Zone, ZoneStatus,
};
pub use error::ProvisionError;
