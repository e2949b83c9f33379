//! `domainforge-infra`: persistence for the provisioning pipeline.
//!
//! The durable store is SQLite via `sqlx`; an in-memory store with the same
//! claim semantics backs tests and local development. Both implement
//! [`JobStore`], whose `claim` is the pipeline's single-owner guarantee.

pub mod in_memory;
pub mod sqlite;
pub mod store;

pub use in_memory::InMemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use store::{JobStore, PageDomainState, StoreError};
