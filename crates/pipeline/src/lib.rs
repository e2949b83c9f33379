//! `domainforge-pipeline`: the provisioning pipeline itself.
//!
//! Wires the registrar, DNS, and allowlist clients into a persisted job
//! state machine: step handlers persist forward progress, the engine
//! enforces single-owner claiming and exponential-backoff retry, and a
//! fixed-interval poller discovers due jobs. The only read surface exposed
//! to the rest of the application is [`status::domain_status`].

pub mod config;
pub mod engine;
pub mod enqueue;
pub mod handlers;
pub mod poller;
pub mod status;


pub use config::PipelineConfig;
pub use engine::{EngineError, JobEngine, ProcessOutcome};
pub use enqueue::{enqueue_domain, EnqueueError};
pub use handlers::{StepError, StepHandlers};
pub use poller::{spawn_poller, PollerHandle};
pub use status::{domain_status, DomainStatusReport};
