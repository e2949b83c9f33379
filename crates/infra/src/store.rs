//! Job store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use domainforge_core::{DomainJob, DomainRegistrant, JobId, PageId, RegistrantId};

/// Store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job already exists: {0}")]
    AlreadyExists(JobId),

    /// A stored row failed validation on read (unknown step/status string,
    /// unparseable metadata). Corrupt rows surface loudly instead of being
    /// skipped.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Domain-facing projection of the owning page, written by terminal steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDomainState {
    pub page_id: PageId,
    /// `pending` until the proxy serves the domain, then `active`.
    pub domain_status: String,
    pub domain_verified: bool,
    pub ssl_status: Option<String>,
}

impl PageDomainState {
    pub fn pending(page_id: PageId) -> Self {
        Self {
            page_id,
            domain_status: "pending".to_string(),
            domain_verified: false,
            ssl_status: None,
        }
    }
}

/// Persistence surface the engine and poller operate against.
///
/// The record shapes round-trip unchanged across process restarts;
/// `DomainJob::metadata` is the sole source of resumption state.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &DomainJob) -> Result<(), StoreError>;

    async fn job(&self, id: JobId) -> Result<Option<DomainJob>, StoreError>;

    /// Persist the full job record (used by handlers and the retry engine).
    async fn update_job(&self, job: &DomainJob) -> Result<(), StoreError>;

    /// Atomically claim a pending job for processing.
    ///
    /// Implemented as a single compare-and-swap ("set `processing` where
    /// status is `pending`"); returns `false` when another worker already
    /// owns the job. A plain read-then-branch is not sufficient because two
    /// pollers in different processes can race between read and write.
    async fn claim(&self, id: JobId) -> Result<bool, StoreError>;

    /// Pending jobs whose `scheduled_for` is null or past, oldest first,
    /// bounded by `limit`.
    async fn due_jobs(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<DomainJob>, StoreError>;

    /// Most recently created job for a page, for status queries.
    async fn latest_job_for_page(&self, page_id: PageId)
        -> Result<Option<DomainJob>, StoreError>;

    async fn insert_registrant(&self, registrant: &DomainRegistrant) -> Result<(), StoreError>;

    async fn registrant(&self, id: RegistrantId)
        -> Result<Option<DomainRegistrant>, StoreError>;

    async fn page_state(&self, page_id: PageId) -> Result<Option<PageDomainState>, StoreError>;

    /// Mark the page's domain live and verified (terminal success write).
    async fn set_page_domain_active(&self, page_id: PageId) -> Result<(), StoreError>;

    async fn set_page_ssl_status(
        &self,
        page_id: PageId,
        ssl_status: &str,
    ) -> Result<(), StoreError>;
}
