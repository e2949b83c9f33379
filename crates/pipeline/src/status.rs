//! Human-readable progress projection for status queries.

use serde::Serialize;

use domainforge_core::{JobStatus, PageId, ProvisionStep};
use domainforge_infra::{JobStore, StoreError};

/// Progress report for one page's latest provisioning job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStatusReport {
    /// Job status string, or `not_found` when no job exists for the page.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
}

fn status_message(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Waiting to be processed...",
        JobStatus::Processing => "Working on it...",
        JobStatus::Completed => "Your domain is live!",
        JobStatus::Failed => "Something went wrong setting up your domain.",
    }
}

fn step_message(step: ProvisionStep) -> &'static str {
    match step {
        ProvisionStep::Register => "Registering your domain...",
        ProvisionStep::ConfigureNamecomDns => "Pointing your domain at our servers...",
        ProvisionStep::ConfigureDns => "Configuring DNS records...",
        ProvisionStep::ProvisionSsl => "Securing your domain with SSL...",
        ProvisionStep::AddToCaddy => "Connecting your domain to your site...",
        ProvisionStep::Complete => "All done.",
    }
}

/// Look up the latest job for `page_id` and project it into a progress
/// report. A page with no job yields a distinct `not_found` report rather
/// than an error.
pub async fn domain_status(
    store: &dyn JobStore,
    page_id: PageId,
) -> Result<DomainStatusReport, StoreError> {
    let Some(job) = store.latest_job_for_page(page_id).await? else {
        return Ok(DomainStatusReport {
            status: "not_found".to_string(),
            step: None,
            message: "No domain setup in progress for this page.".to_string(),
        });
    };

    let mut message = format!(
        "{} {}",
        status_message(job.status),
        step_message(job.step)
    );
    if let Some(err) = &job.last_error {
        message.push_str(&format!(" Last error: {err}"));
    }

    Ok(DomainStatusReport {
        status: job.status.as_str().to_string(),
        step: Some(job.step.as_str().to_string()),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainforge_core::{DomainJob, RegistrantId, RetryPolicy};
    use domainforge_infra::InMemoryJobStore;

    #[tokio::test]
    async fn missing_job_reports_not_found() {
        let store = InMemoryJobStore::new();
        let report = domain_status(&store, PageId::new()).await.unwrap();

        assert_eq!(report.status, "not_found");
        assert!(report.step.is_none());
    }

    #[tokio::test]
    async fn pending_register_job_reports_progress() {
        let store = InMemoryJobStore::new();
        let job = DomainJob::new(PageId::new(), "example.com", RegistrantId::new());
        store.insert_job(&job).await.unwrap();

        let report = domain_status(&store, job.page_id).await.unwrap();
        assert_eq!(report.status, "pending");
        assert_eq!(report.step.as_deref(), Some("register"));
        assert_eq!(
            report.message,
            "Waiting to be processed... Registering your domain..."
        );
    }

    #[tokio::test]
    async fn last_error_is_appended() {
        let store = InMemoryJobStore::new();
        let mut job = DomainJob::new(PageId::new(), "example.com", RegistrantId::new());
        job.record_failure("network timeout", &RetryPolicy::default())
            .unwrap();
        store.insert_job(&job).await.unwrap();

        let report = domain_status(&store, job.page_id).await.unwrap();
        assert!(report.message.ends_with("Last error: network timeout"));
    }

    #[tokio::test]
    async fn completed_job_reports_live() {
        let store = InMemoryJobStore::new();
        let mut job = DomainJob::new(PageId::new(), "example.com", RegistrantId::new());
        job.complete().unwrap();
        store.insert_job(&job).await.unwrap();

        let report = domain_status(&store, job.page_id).await.unwrap();
        assert_eq!(report.status, "completed");
        assert_eq!(report.step.as_deref(), Some("complete"));
        assert_eq!(report.message, "Your domain is live! All done.");
    }

    #[test]
    fn every_status_and_step_has_copy() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert!(!status_message(status).is_empty());
        }
        for step in [
            ProvisionStep::Register,
            ProvisionStep::ConfigureNamecomDns,
            ProvisionStep::ConfigureDns,
            ProvisionStep::ProvisionSsl,
            ProvisionStep::AddToCaddy,
            ProvisionStep::Complete,
        ] {
            assert!(!step_message(step).is_empty());
        }
    }
}
