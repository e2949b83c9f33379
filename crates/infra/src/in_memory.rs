//! In-memory job store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use domainforge_core::{DomainJob, DomainRegistrant, JobId, JobStatus, PageId, RegistrantId};

use crate::store::{JobStore, PageDomainState, StoreError};

/// Hash-map backed [`JobStore`] with the same claim semantics as the
/// durable store: the pending-check and the processing-write happen under
/// one lock, so concurrent claimers observe exactly one winner.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, DomainJob>>,
    registrants: RwLock<HashMap<RegistrantId, DomainRegistrant>>,
    pages: RwLock<HashMap<PageId, PageDomainState>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, job: &DomainJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn job(&self, id: JobId) -> Result<Option<DomainJob>, StoreError> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn update_job(&self, job: &DomainJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::JobNotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn claim(&self, id: JobId) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Processing;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn due_jobs(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<DomainJob>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut due: Vec<_> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();
        due.sort_by_key(|j| j.created_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn latest_job_for_page(
        &self,
        page_id: PageId,
    ) -> Result<Option<DomainJob>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs
            .values()
            .filter(|j| j.page_id == page_id)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn insert_registrant(&self, registrant: &DomainRegistrant) -> Result<(), StoreError> {
        self.registrants
            .write()
            .unwrap()
            .insert(registrant.id, registrant.clone());
        Ok(())
    }

    async fn registrant(
        &self,
        id: RegistrantId,
    ) -> Result<Option<DomainRegistrant>, StoreError> {
        Ok(self.registrants.read().unwrap().get(&id).cloned())
    }

    async fn page_state(&self, page_id: PageId) -> Result<Option<PageDomainState>, StoreError> {
        Ok(self.pages.read().unwrap().get(&page_id).cloned())
    }

    async fn set_page_domain_active(&self, page_id: PageId) -> Result<(), StoreError> {
        let mut pages = self.pages.write().unwrap();
        let state = pages
            .entry(page_id)
            .or_insert_with(|| PageDomainState::pending(page_id));
        state.domain_status = "active".to_string();
        state.domain_verified = true;
        Ok(())
    }

    async fn set_page_ssl_status(
        &self,
        page_id: PageId,
        ssl_status: &str,
    ) -> Result<(), StoreError> {
        let mut pages = self.pages.write().unwrap();
        let state = pages
            .entry(page_id)
            .or_insert_with(|| PageDomainState::pending(page_id));
        state.ssl_status = Some(ssl_status.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> DomainJob {
        DomainJob::new(PageId::new(), "example.com", RegistrantId::new())
    }

    #[tokio::test]
    async fn claim_is_a_compare_and_swap() {
        let store = InMemoryJobStore::new();
        let job = test_job();
        store.insert_job(&job).await.unwrap();

        assert!(store.claim(job.id).await.unwrap());
        // Already processing: second claim loses.
        assert!(!store.claim(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let store = InMemoryJobStore::arc();
        let job = test_job();
        store.insert_job(&job).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = job.id;
            handles.push(tokio::spawn(async move { store.claim(id).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn terminal_jobs_cannot_be_claimed() {
        let store = InMemoryJobStore::new();
        let mut job = test_job();
        job.complete().unwrap();
        store.insert_job(&job).await.unwrap();

        assert!(!store.claim(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn due_jobs_respects_schedule_and_order() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut early = test_job();
        early.created_at = now - chrono::Duration::minutes(5);
        let mut late = test_job();
        late.created_at = now - chrono::Duration::minutes(1);
        let mut deferred = test_job();
        deferred.scheduled_for = Some(now + chrono::Duration::minutes(10));

        store.insert_job(&late).await.unwrap();
        store.insert_job(&early).await.unwrap();
        store.insert_job(&deferred).await.unwrap();

        let due = store.due_jobs(now, 10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, early.id);
        assert_eq!(due[1].id, late.id);

        // The batch bound truncates after ordering, keeping the oldest.
        let capped = store.due_jobs(now, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, early.id);
    }

    #[tokio::test]
    async fn latest_job_wins_for_status_queries() {
        let store = InMemoryJobStore::new();
        let page_id = PageId::new();
        let now = Utc::now();

        let mut first = DomainJob::new(page_id, "old.com", RegistrantId::new());
        first.created_at = now - chrono::Duration::hours(1);
        let mut second = DomainJob::new(page_id, "new.com", RegistrantId::new());
        second.created_at = now;

        store.insert_job(&first).await.unwrap();
        store.insert_job(&second).await.unwrap();

        let latest = store.latest_job_for_page(page_id).await.unwrap().unwrap();
        assert_eq!(latest.domain, "new.com");
    }
}
