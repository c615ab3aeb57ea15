use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobResults, JobStatus};

/// In-memory table of job records.
///
/// Handlers insert `queued` records and read; the worker performs every
/// other transition.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
    retention: Option<TimeDelta>,
}

impl JobStore {
    /// A store that keeps every record for the life of the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that forgets `complete` and `failed` records once they are
    /// older than `retention`. Queued and processing jobs are never removed.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention: TimeDelta::from_std(retention).ok(),
            ..Self::default()
        }
    }

    /// Register a newly submitted job, sweeping expired finished records.
    pub async fn insert_queued(&self, job_id: Uuid) {
        let mut jobs = self.jobs.write().await;

        let cutoff = self
            .retention
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        if let Some(cutoff) = cutoff {
            let before = jobs.len();
            jobs.retain(|_, record| !(record.status.is_terminal() && record.updated_at <= cutoff));
            let expired = before - jobs.len();
            if expired > 0 {
                tracing::debug!(expired, "Removed expired job records");
            }
        }

        jobs.insert(job_id, JobRecord::queued());
    }

    pub async fn mark_processing(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Processing, None).await
    }

    pub async fn complete(&self, job_id: Uuid, counts: Vec<i64>) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Complete, Some(JobResults::Counts(counts)))
            .await
    }

    pub async fn fail(&self, job_id: Uuid, error: impl Into<String>) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Failed, Some(JobResults::Error(error.into())))
            .await
    }

    /// Drop a record that never reached the queue.
    pub async fn discard(&self, job_id: Uuid) {
        self.jobs.write().await.remove(&job_id);
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn transition(
        &self,
        job_id: Uuid,
        next: JobStatus,
        results: Option<JobResults>,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&job_id).ok_or(StoreError::UnknownJob(job_id))?;

        if !record.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.results = results;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("Unknown job {0}")]
    UnknownJob(Uuid),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}
