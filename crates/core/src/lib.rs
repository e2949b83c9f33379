//! `domainforge-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives for the provisioning
//! pipeline (no infrastructure concerns): identifiers, the job record and
//! its state machine vocabulary, registrant contact data, and retry policy.

pub mod error;
pub mod id;
pub mod job;
pub mod registrant;
pub mod retry;
pub mod step;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, PageId, RegistrantId};
pub use job::{DomainJob, JobMetadata, JobStatus};
pub use registrant::DomainRegistrant;
pub use retry::RetryPolicy;
pub use step::ProvisionStep;
