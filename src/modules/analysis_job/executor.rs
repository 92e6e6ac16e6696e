use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::models::analysis_job::{error_result, JobStore};
use crate::services::analysis::AnalysisPipeline;
use crate::utils::uploads::TransientFile;

use super::types::{AnalysisTask, RunOutcome};

/// Runs the pipeline for one job and records whatever it produced. The
/// transient file is owned by this call and is gone when it returns.
pub async fn run_analysis(
    task: AnalysisTask,
    pipeline: Arc<dyn AnalysisPipeline>,
    store: JobStore,
) -> RunOutcome {
    let started = Instant::now();
    let document = TransientFile::new(task.file_path);
    info!(
        "[ANALYSIS-JOB] starting analysis: job_id={} file={}",
        task.job_id,
        document.path().display()
    );

    let (result, outcome) = match pipeline.analyze(&task.query, document.path()).await {
        Ok(report) => (report, RunOutcome::Succeeded),
        Err(err) => {
            warn!(
                "[ANALYSIS-JOB] analysis failed: job_id={} error={}",
                task.job_id, err
            );
            (error_result(&err.to_string()), RunOutcome::Failed)
        }
    };
    drop(document);

    match store.complete_job(&task.job_id, &result).await {
        Ok(true) => {
            info!(
                "[ANALYSIS-JOB] finished analysis: job_id={} outcome={:?} elapsed_ms={}",
                task.job_id,
                outcome,
                started.elapsed().as_millis()
            );
            outcome
        }
        Ok(false) => {
            warn!(
                "[ANALYSIS-JOB] job was not pending, result discarded: job_id={}",
                task.job_id
            );
            RunOutcome::Discarded
        }
        Err(err) => {
            warn!(
                "[ANALYSIS-JOB] persist result failed: job_id={} error={}",
                task.job_id, err
            );
            RunOutcome::PersistFailed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::run_analysis;
    use crate::db::{init_sqlite, SqliteConfig};
    use crate::models::analysis_job::{JobStatus, JobStore};
    use crate::modules::analysis_job::types::{AnalysisTask, RunOutcome};
    use crate::services::analysis::pipeline::AnalysisBoxFuture;
    use crate::services::analysis::{AnalysisError, AnalysisPipeline};

    pub(crate) struct StubPipeline {
        pub output: Result<String, String>,
    }

    impl AnalysisPipeline for StubPipeline {
        fn analyze<'a>(
            &'a self,
            _query: &'a str,
            file_path: &'a Path,
        ) -> AnalysisBoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move {
                assert!(file_path.exists(), "document must exist while analyzing");
                self.output.clone().map_err(AnalysisError::Llm)
            })
        }
    }

    pub(crate) async fn open_store(dir: &tempfile::TempDir) -> JobStore {
        let cfg = SqliteConfig::at(dir.path().join("jobs.db").to_string_lossy());
        JobStore::new(init_sqlite(&cfg).await.expect("init sqlite"))
    }

    async fn prepare(dir: &tempfile::TempDir, store: &JobStore) -> AnalysisTask {
        let file_path = dir.path().join("upload_report.txt");
        std::fs::write(&file_path, "revenue up").unwrap();
        let job_id = store.create_job("report.txt").await.unwrap();
        AnalysisTask {
            job_id,
            query: "Should I invest?".to_string(),
            file_path,
        }
    }

    #[tokio::test]
    async fn success_completes_job_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let task = prepare(&dir, &store).await;
        let (job_id, path) = (task.job_id.clone(), task.file_path.clone());
        let pipeline = Arc::new(StubPipeline {
            output: Ok("Buy".to_string()),
        });

        let outcome = run_analysis(task, pipeline, store.clone()).await;

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert!(!path.exists());
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("Buy"));
    }

    #[tokio::test]
    async fn failure_is_recorded_as_error_result_and_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let task = prepare(&dir, &store).await;
        let (job_id, path) = (task.job_id.clone(), task.file_path.clone());
        let pipeline = Arc::new(StubPipeline {
            output: Err("model unavailable".to_string()),
        });

        let outcome = run_analysis(task, pipeline, store.clone()).await;

        assert_eq!(outcome, RunOutcome::Failed);
        assert!(!path.exists());
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let result = job.result.unwrap();
        assert!(result.starts_with("Error: "), "unexpected result {result}");
        assert!(result.contains("model unavailable"));
    }

    #[tokio::test]
    async fn already_completed_job_keeps_its_first_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let task = prepare(&dir, &store).await;
        let job_id = task.job_id.clone();
        store.complete_job(&job_id, "first").await.unwrap();

        let pipeline = Arc::new(StubPipeline {
            output: Ok("second".to_string()),
        });
        let outcome = run_analysis(task, pipeline, store.clone()).await;

        assert_eq!(outcome, RunOutcome::Discarded);
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.result.as_deref(), Some("first"));
    }
}
