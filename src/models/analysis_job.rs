use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::repositories::analysis_jobs as repo;

/// Prefix stored in front of a failed analysis' message.
pub const ERROR_RESULT_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: Option<String>,
    pub result: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct AnalysisJobRow {
    pub job_id: String,
    pub status: String,
    pub filename: Option<String>,
    pub result: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl AnalysisJobRow {
    pub fn to_job(self) -> Result<AnalysisJob, String> {
        Ok(AnalysisJob {
            status: self.status.parse()?,
            job_id: self.job_id,
            filename: self.filename,
            result: self.result,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub fn error_result(message: &str) -> String {
    format!("{ERROR_RESULT_PREFIX}{message}")
}

/// Durable job records. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_job(&self, filename: &str) -> Result<String, String> {
        repo::create_job(&self.pool, filename).await
    }

    /// Returns `false` when the job is unknown or already completed.
    pub async fn complete_job(&self, job_id: &str, result: &str) -> Result<bool, String> {
        repo::complete_job(&self.pool, job_id, result).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<AnalysisJob>, String> {
        repo::get_job(&self.pool, job_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<AnalysisJob>, String> {
        repo::list_jobs_by_status(&self.pool, JobStatus::Pending).await
    }
}
