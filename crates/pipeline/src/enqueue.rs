//! Pipeline entry point: create the registrant and the job.

use tracing::info;

use domainforge_core::{DomainError, DomainJob, DomainRegistrant, PageId};
use domainforge_infra::{JobStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Enqueue a freshly purchased domain for provisioning.
///
/// Creates the registrant record and one job at `register`/`pending`,
/// immediately eligible for the next poller tick.
pub async fn enqueue_domain(
    store: &dyn JobStore,
    page_id: PageId,
    domain: &str,
    registrant: DomainRegistrant,
) -> Result<DomainJob, EnqueueError> {
    if domain.trim().is_empty() || !domain.contains('.') {
        return Err(DomainError::validation("domain name is invalid").into());
    }
    registrant.validate()?;

    store.insert_registrant(&registrant).await?;
    let job = DomainJob::new(page_id, domain, registrant.id);
    store.insert_job(&job).await?;

    info!(job_id = %job.id, page_id = %page_id, domain, "domain provisioning enqueued");
    Ok(job)
}
