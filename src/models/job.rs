use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Count recorded for a keyword whose fetch failed after exhausting retries.
pub const KEYWORD_FAILED: i64 = -1;

/// Search deployment a job is run against.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Dev,
}

/// Status of a keyword count job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Jobs only move forward: queued -> processing -> complete | failed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Complete)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// One entry of a submitted keyword list.
///
/// Spreadsheet clients send numeric cells as JSON numbers, so any value is
/// accepted here and judged per keyword when the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keyword {
    Text(String),
    Number(Number),
    /// null, booleans, lists and objects; counted as [`KEYWORD_FAILED`].
    Unusable(Value),
}

impl Keyword {
    /// Text sent to the search backend, if this entry can be searched at all.
    pub fn as_query(&self) -> Option<Cow<'_, str>> {
        match self {
            Keyword::Text(text) => Some(Cow::Borrowed(text)),
            Keyword::Number(number) => Some(Cow::Owned(number.to_string())),
            Keyword::Unusable(_) => None,
        }
    }
}

impl From<&str> for Keyword {
    fn from(text: &str) -> Self {
        Keyword::Text(text.to_string())
    }
}

/// A batch of keywords to count against one shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub keywords: Vec<Keyword>,
    pub shop_id: String,
    pub environment: Environment,
}

/// Outcome stored on a terminal job.
///
/// Serialized untagged so `results` is either an array of counts or an
/// error string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JobResults {
    Counts(Vec<i64>),
    Error(String),
}

/// Current state of a job as seen by readers of the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Queued,
            results: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn counts(&self) -> Option<&[i64]> {
        match &self.results {
            Some(JobResults::Counts(counts)) => Some(counts),
            _ => None,
        }
    }
}

/// A job waiting in the queue.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub job: Job,
}
