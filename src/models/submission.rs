use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Environment, Job, JobRecord, JobResults, Keyword};

/// Request to start a keyword count job.
///
/// Batch size is bounded only by the request body limit.
#[derive(Debug, Deserialize, Validate)]
pub struct StartJobRequest {
    #[garde(skip)]
    pub keywords: Vec<Keyword>,

    #[garde(length(min = 1))]
    pub shop_id: String,

    #[serde(default)]
    #[garde(skip)]
    pub environment: Environment,
}

impl From<StartJobRequest> for Job {
    fn from(request: StartJobRequest) -> Self {
        Job {
            keywords: request.keywords,
            shop_id: request.shop_id,
            environment: request.environment,
        }
    }
}

/// Response after a job has been accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub status: String,
    pub job_id: Uuid,
}

/// Response for querying job status.
///
/// `status` is one of the job statuses, or `not_found` for unknown ids.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobStatusResponse {
    pub fn not_found() -> Self {
        Self {
            status: "not_found".to_string(),
            results: None,
            submitted_at: None,
            updated_at: None,
        }
    }
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            status: record.status.to_string(),
            results: record.results,
            submitted_at: Some(record.submitted_at),
            updated_at: Some(record.updated_at),
        }
    }
}
