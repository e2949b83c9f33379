//! Claim & retry engine.
//!
//! The engine is the only component that claims jobs and the sole place
//! that decides retry versus permanent failure. Handlers throw; the engine
//! catches, backs off, and enforces the attempt ceiling.

use std::sync::Arc;

use tracing::{debug, warn};

use domainforge_core::{DomainError, JobId, RetryPolicy};
use domainforge_infra::{JobStore, StoreError};

use crate::handlers::{StepError, StepHandlers};

/// Engine-level failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The attempt ceiling was reached; the job is now permanently failed.
    /// The underlying step error is re-thrown to the poller for logging.
    #[error("job {id} permanently failed after {attempts} attempts: {source}")]
    PermanentlyFailed {
        id: JobId,
        attempts: u32,
        #[source]
        source: StepError,
    },

    /// A step failed but the job had concurrently reached a terminal state.
    /// Nothing was mutated; the original error is surfaced.
    #[error("step failed on already-terminal job {id}: {source}")]
    TerminalRace {
        id: JobId,
        #[source]
        source: StepError,
    },

    /// A claimed job disappeared from the store mid-flight.
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// What a single `process` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another worker claimed the job first; abandoned without side effects.
    Abandoned,
    /// The step handler ran and persisted the job's next state.
    Progressed,
    /// The step failed; the job was requeued with backoff.
    Retrying { attempts: u32 },
}

pub struct JobEngine {
    store: Arc<dyn JobStore>,
    handlers: StepHandlers,
    retry: RetryPolicy,
}

impl JobEngine {
    pub fn new(store: Arc<dyn JobStore>, handlers: StepHandlers, retry: RetryPolicy) -> Self {
        Self {
            store,
            handlers,
            retry,
        }
    }

    /// Claim and execute one job.
    ///
    /// The claim is a compare-and-swap against the store; losing it means
    /// another worker owns the job and this call returns without touching
    /// anything. A plain read-then-branch would race across processes.
    pub async fn process(&self, id: JobId) -> Result<ProcessOutcome, EngineError> {
        if !self.store.claim(id).await? {
            debug!(job_id = %id, "claim lost; job owned by another worker");
            return Ok(ProcessOutcome::Abandoned);
        }

        let mut job = self
            .store
            .job(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        match self.handlers.run(&mut job).await {
            Ok(()) => Ok(ProcessOutcome::Progressed),
            Err(step_err) => self.record_failure(id, step_err).await,
        }
    }

    /// Failure path: back off or permanently fail.
    ///
    /// The job is re-read first; a job that concurrently reached a terminal
    /// state must not be resurrected by a late-arriving error handler, so
    /// the error is re-thrown without mutating state.
    async fn record_failure(
        &self,
        id: JobId,
        source: StepError,
    ) -> Result<ProcessOutcome, EngineError> {
        let Some(mut job) = self.store.job(id).await? else {
            return Err(EngineError::NotFound(id));
        };

        if job.is_terminal() {
            return Err(EngineError::TerminalRace { id, source });
        }

        let retrying = job.record_failure(source.to_string(), &self.retry)?;
        self.store.update_job(&job).await?;

        if retrying {
            warn!(
                job_id = %id,
                domain = %job.domain,
                step = %job.step,
                attempts = job.attempts,
                error = %source,
                "step failed; requeued with backoff"
            );
            Ok(ProcessOutcome::Retrying {
                attempts: job.attempts,
            })
        } else {
            Err(EngineError::PermanentlyFailed {
                id,
                attempts: job.attempts,
                source,
            })
        }
    }
}
