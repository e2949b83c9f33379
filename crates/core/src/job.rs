//! The persisted job record and its state machine.

use core::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{JobId, PageId, RegistrantId};
use crate::retry::RetryPolicy;
use crate::step::ProvisionStep;

/// Default ceiling on failed attempts before a job is permanently failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Job execution status.
///
/// Transitions only along `pending -> processing -> {pending, completed,
/// failed}`. `completed` and `failed` are terminal and immutable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed (initial state, and the retry state).
    Pending,
    /// Claimed by exactly one worker.
    Processing,
    /// Terminal success.
    Completed,
    /// Terminal failure after exhausting `max_attempts`.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::validation(format!("unknown status: {other}"))),
        }
    }
}

/// Step artifacts that must survive process restarts.
///
/// This is the sole source of resumption state: `registrar_order_id` is the
/// idempotency guard that prevents a crashed-then-retried `register` step
/// from purchasing the domain twice. Typed fields (instead of an open
/// key/value bag) make a key typo a compile error rather than a silent
/// resumption bug; unknown keys in stored data are rejected on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobMetadata {
    /// Contact record submitted to the registrar. Required by `register`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant_id: Option<RegistrantId>,

    /// Order id returned by the registrar, persisted in its own write
    /// before the step advances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar_order_id: Option<String>,

    /// Provider key the domain was registered through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar_provider: Option<String>,

    /// CDN zone id. Required by the legacy `configure_dns` branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

/// One persisted attempt-sequence to provision a single domain end-to-end.
///
/// Mutated exclusively by the claim engine and step handlers. Terminal jobs
/// are never deleted by this subsystem; they remain as an audit trail.
///
/// `attempts` is a single running counter across the whole job (a failure at
/// `register` and a later failure at `add_to_caddy` share the same counter
/// toward `max_attempts`). The ceiling is per-job data, so pipelines that
/// need more headroom raise `max_attempts` at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainJob {
    pub id: JobId,
    pub page_id: PageId,
    /// Fully-qualified domain name being provisioned.
    pub domain: String,
    pub status: JobStatus,
    pub step: ProvisionStep,
    /// Failed execution attempts so far.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Most recent failure reason, surfaced to status queries.
    pub last_error: Option<String>,
    pub metadata: JobMetadata,
    /// Earliest time this job may next be claimed. `None` means immediately
    /// eligible.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DomainJob {
    /// Create a job at `register`/`pending` for a freshly purchased domain.
    pub fn new(page_id: PageId, domain: impl Into<String>, registrant_id: RegistrantId) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            page_id,
            domain: domain.into(),
            status: JobStatus::Pending,
            step: ProvisionStep::Register,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            metadata: JobMetadata {
                registrant_id: Some(registrant_id),
                ..JobMetadata::default()
            },
            scheduled_for: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the job is eligible for claiming at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending
            && self.scheduled_for.map_or(true, |at| at <= now)
    }

    /// Advance to the next step and requeue after `delay`.
    ///
    /// Steps only ever move forward; a regression is an invariant violation.
    pub fn advance(&mut self, next: ProvisionStep, delay: Duration) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::Terminal);
        }
        if !self.step.allows_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "step cannot regress from {} to {}",
                self.step, next
            )));
        }
        let now = Utc::now();
        self.step = next;
        self.status = JobStatus::Pending;
        self.scheduled_for = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
        self.updated_at = now;
        Ok(())
    }

    /// Requeue at the *same* step after `delay`.
    ///
    /// This is the "still propagating" path: the external resource is not
    /// ready yet, which is not a failure, so `attempts` is untouched.
    pub fn reschedule(&mut self, delay: Duration) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::Terminal);
        }
        let now = Utc::now();
        self.status = JobStatus::Pending;
        self.scheduled_for = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
        self.updated_at = now;
        Ok(())
    }

    /// Terminal success: stamps `completed_at` and parks the job at
    /// `complete`.
    pub fn complete(&mut self) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::Terminal);
        }
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.step = ProvisionStep::Complete;
        self.scheduled_for = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record a thrown step failure.
    ///
    /// Increments `attempts`, stores `last_error`, and either requeues with
    /// exponential backoff (returns `true`) or, once `max_attempts` is
    /// reached, flips to permanent `failed` (returns `false`).
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        policy: &RetryPolicy,
    ) -> DomainResult<bool> {
        if self.is_terminal() {
            return Err(DomainError::Terminal);
        }
        let now = Utc::now();
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.updated_at = now;

        if self.attempts >= self.max_attempts {
            self.status = JobStatus::Failed;
            self.scheduled_for = None;
            return Ok(false);
        }

        let delay = policy.delay_for_attempt(self.attempts);
        self.status = JobStatus::Pending;
        self.scheduled_for = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> DomainJob {
        DomainJob::new(PageId::new(), "example.com", RegistrantId::new())
    }

    #[test]
    fn new_job_starts_pending_at_register() {
        let job = test_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.step, ProvisionStep::Register);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.metadata.registrant_id.is_some());
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn advance_moves_forward_and_defers() {
        let mut job = test_job();
        job.advance(ProvisionStep::ConfigureNamecomDns, Duration::from_secs(30))
            .unwrap();

        assert_eq!(job.step, ProvisionStep::ConfigureNamecomDns);
        assert_eq!(job.status, JobStatus::Pending);
        let due = job.scheduled_for.unwrap();
        assert!(due > Utc::now() + chrono::Duration::seconds(25));
        assert!(!job.is_due(Utc::now()));
    }

    #[test]
    fn advance_rejects_regression() {
        let mut job = test_job();
        job.advance(ProvisionStep::AddToCaddy, Duration::ZERO).unwrap();
        let err = job
            .advance(ProvisionStep::Register, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reschedule_keeps_step_and_attempts() {
        let mut job = test_job();
        job.advance(ProvisionStep::ConfigureDns, Duration::ZERO).unwrap();
        job.reschedule(Duration::from_secs(120)).unwrap();

        assert_eq!(job.step, ProvisionStep::ConfigureDns);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn failure_backs_off_exponentially() {
        let mut job = test_job();
        let policy = RetryPolicy::default();

        let retrying = job.record_failure("network timeout", &policy).unwrap();
        assert!(retrying);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.step, ProvisionStep::Register);
        assert_eq!(job.last_error.as_deref(), Some("network timeout"));

        let due = job.scheduled_for.unwrap();
        let delta = due - Utc::now();
        assert!(delta > chrono::Duration::seconds(110));
        assert!(delta <= chrono::Duration::seconds(120));
    }

    #[test]
    fn failure_at_the_limit_is_permanent() {
        let mut job = test_job();
        job.attempts = 4;
        let retrying = job
            .record_failure("still broken", &RetryPolicy::default())
            .unwrap();

        assert!(!retrying);
        assert_eq!(job.attempts, 5);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.scheduled_for.is_none());
    }

    #[test]
    fn terminal_jobs_are_immutable() {
        let mut job = test_job();
        job.complete().unwrap();
        let before = job.clone();

        assert_eq!(job.advance(ProvisionStep::Complete, Duration::ZERO), Err(DomainError::Terminal));
        assert_eq!(job.reschedule(Duration::ZERO), Err(DomainError::Terminal));
        assert_eq!(
            job.record_failure("late error", &RetryPolicy::default()),
            Err(DomainError::Terminal)
        );
        assert_eq!(job, before);
    }

    #[test]
    fn completion_stamps_terminal_state() {
        let mut job = test_job();
        job.advance(ProvisionStep::AddToCaddy, Duration::ZERO).unwrap();
        job.complete().unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.step, ProvisionStep::Complete);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn metadata_rejects_unknown_keys_on_read() {
        let err = serde_json::from_str::<JobMetadata>(r#"{"registrarOrderid":"ORD-1"}"#);
        assert!(err.is_err());

        let ok: JobMetadata =
            serde_json::from_str(r#"{"registrar_order_id":"ORD-1"}"#).unwrap();
        assert_eq!(ok.registrar_order_id.as_deref(), Some("ORD-1"));
    }
}
