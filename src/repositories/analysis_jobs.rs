use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::time::now_rfc3339;
use crate::models::analysis_job::{AnalysisJob, AnalysisJobRow, JobStatus};

pub async fn create_job(pool: &SqlitePool, filename: &str) -> Result<String, String> {
    let job_id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO analysis_jobs (job_id, status, filename, result, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?)",
    )
    .bind(&job_id)
    .bind(JobStatus::Pending.as_str())
    .bind(filename)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| format!("insert analysis job failed: {e}"))?;
    Ok(job_id)
}

/// Completion only applies to a pending row, so the result is written once.
pub async fn complete_job(pool: &SqlitePool, job_id: &str, result: &str) -> Result<bool, String> {
    let outcome = sqlx::query(
        "UPDATE analysis_jobs SET status = ?, result = ?, updated_at = ? WHERE job_id = ? AND status = ?",
    )
    .bind(JobStatus::Completed.as_str())
    .bind(result)
    .bind(now_rfc3339())
    .bind(job_id)
    .bind(JobStatus::Pending.as_str())
    .execute(pool)
    .await
    .map_err(|e| format!("complete analysis job failed: {e}"))?;
    Ok(outcome.rows_affected() > 0)
}

pub async fn get_job(pool: &SqlitePool, job_id: &str) -> Result<Option<AnalysisJob>, String> {
    let row = sqlx::query_as::<_, AnalysisJobRow>(
        "SELECT job_id, status, filename, result, created_at, updated_at FROM analysis_jobs WHERE job_id = ?",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("load analysis job failed: {e}"))?;
    row.map(|item| item.to_job()).transpose()
}

pub async fn list_jobs_by_status(
    pool: &SqlitePool,
    status: JobStatus,
) -> Result<Vec<AnalysisJob>, String> {
    let rows = sqlx::query_as::<_, AnalysisJobRow>(
        "SELECT job_id, status, filename, result, created_at, updated_at FROM analysis_jobs WHERE status = ? ORDER BY created_at ASC",
    )
    .bind(status.as_str())
    .fetch_all(pool)
    .await
    .map_err(|e| format!("list analysis jobs failed: {e}"))?;
    rows.into_iter().map(|item| item.to_job()).collect()
}
