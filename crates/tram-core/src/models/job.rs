use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::document::Document;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "job_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// pending -> running | failed, running -> complete | failed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Queue entry for the external ML pipeline: one per ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentProcessingJob {
    pub id: i64,
    pub document_id: i64,
    pub status: JobStatus,
    pub message: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Job as listed by the API, with the document it is processing.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: i64,
    pub status: JobStatus,
    pub message: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub document: DocumentSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub name: String,
    pub content_type: String,
    pub file_size: i64,
}

impl JobResponse {
    pub fn new(job: DocumentProcessingJob, document: &Document) -> Self {
        Self {
            id: job.id,
            status: job.status,
            message: job.message,
            created_by: job.created_by,
            created_on: job.created_on,
            updated_on: job.updated_on,
            document: DocumentSummary {
                id: document.id,
                name: document.original_name.clone(),
                content_type: document.content_type.clone(),
                file_size: document.file_size,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Complete));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Complete));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("completed".parse::<JobStatus>().is_err());
    }
}
