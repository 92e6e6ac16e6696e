use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::analysis_job::{error_result, JobStore};
use crate::services::analysis::AnalysisPipeline;
use crate::utils::uploads::TransientFile;

use super::executor;
use super::types::{AnalysisTask, WorkerOptions};

pub const SHUTDOWN_MESSAGE: &str = "analysis cancelled by server shutdown";

/// Handle for queueing analyses onto the background pool.
#[derive(Clone)]
pub struct AnalysisWorker {
    tx: mpsc::UnboundedSender<AnalysisTask>,
    stopped: CancellationToken,
}

impl AnalysisWorker {
    /// Spawns the dispatcher. At most `max_concurrency` analyses run at once;
    /// the rest wait in the queue. Cancelling `shutdown` stops dispatching but
    /// leaves running analyses alone. Queued jobs are closed with an error.
    pub fn start(
        pipeline: Arc<dyn AnalysisPipeline>,
        store: JobStore,
        options: WorkerOptions,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = CancellationToken::new();
        info!(
            "[ANALYSIS-JOB] starting worker pool, max_concurrency={}",
            options.max_concurrency
        );
        tokio::spawn(dispatch_loop(
            rx,
            pipeline,
            store,
            options,
            shutdown,
            stopped.clone(),
        ));
        Self { tx, stopped }
    }

    pub fn submit(&self, task: AnalysisTask) -> Result<(), String> {
        self.tx
            .send(task)
            .map_err(|err| format!("analysis queue closed, job_id={}", err.0.job_id))
    }

    /// Resolves once the dispatcher has exited and every queued job has been
    /// closed.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<AnalysisTask>,
    pipeline: Arc<dyn AnalysisPipeline>,
    store: JobStore,
    options: WorkerOptions,
    shutdown: CancellationToken,
    stopped: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(options.max_concurrency.max(1)));

    loop {
        let task = tokio::select! {
            _ = shutdown.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => {
                abandon_task(&store, task).await;
                break;
            }
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    abandon_task(&store, task).await;
                    break;
                }
            },
        };

        let pipeline = Arc::clone(&pipeline);
        let store = store.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let job_id = task.job_id.clone();
            let handle = tokio::spawn(executor::run_analysis(task, pipeline, store.clone()));
            if let Err(join_err) = handle.await {
                error!(
                    "[ANALYSIS-JOB] analysis task aborted: job_id={} error={}",
                    job_id, join_err
                );
                let message = format!("analysis task panicked: {join_err}");
                if let Err(err) = store.complete_job(&job_id, &error_result(&message)).await {
                    warn!(
                        "[ANALYSIS-JOB] record aborted job failed: job_id={} error={}",
                        job_id, err
                    );
                }
            }
        });
    }

    rx.close();
    while let Ok(task) = rx.try_recv() {
        abandon_task(&store, task).await;
    }
    info!("[ANALYSIS-JOB] worker pool stopped dispatching");
    stopped.cancel();
}

/// Closes a job that will never run and removes its upload.
async fn abandon_task(store: &JobStore, task: AnalysisTask) {
    let _document = TransientFile::new(task.file_path);
    warn!(
        "[ANALYSIS-JOB] dropping queued analysis at shutdown: job_id={}",
        task.job_id
    );
    if let Err(err) = store
        .complete_job(&task.job_id, &error_result(SHUTDOWN_MESSAGE))
        .await
    {
        warn!(
            "[ANALYSIS-JOB] record dropped job failed: job_id={} error={}",
            task.job_id, err
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    use super::{AnalysisWorker, SHUTDOWN_MESSAGE};
    use crate::models::analysis_job::{JobStatus, JobStore};
    use crate::modules::analysis_job::executor::tests::open_store;
    use crate::modules::analysis_job::types::{AnalysisTask, WorkerOptions};
    use crate::services::analysis::pipeline::AnalysisBoxFuture;
    use crate::services::analysis::{AnalysisError, AnalysisPipeline};

    /// Blocks every analysis until released, tracking peak concurrency.
    struct GatedPipeline {
        gate: Notify,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl AnalysisPipeline for GatedPipeline {
        fn analyze<'a>(
            &'a self,
            _query: &'a str,
            _file_path: &'a Path,
        ) -> AnalysisBoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                self.gate.notified().await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                Ok("done".to_string())
            })
        }
    }

    struct PanickingPipeline;

    impl AnalysisPipeline for PanickingPipeline {
        fn analyze<'a>(
            &'a self,
            _query: &'a str,
            _file_path: &'a Path,
        ) -> AnalysisBoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move { panic!("pipeline blew up") })
        }
    }

    async fn wait_for_status(store: &JobStore, job_id: &str, status: JobStatus) {
        for _ in 0..200 {
            let job = store.get_job(job_id).await.unwrap().unwrap();
            if job.status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {status}");
    }

    async fn enqueue(
        dir: &tempfile::TempDir,
        store: &JobStore,
        worker: &AnalysisWorker,
        n: usize,
    ) -> (String, std::path::PathBuf) {
        let path = dir.path().join(format!("doc-{n}.txt"));
        std::fs::write(&path, "content").unwrap();
        let job_id = store.create_job("doc.txt").await.unwrap();
        worker
            .submit(AnalysisTask {
                job_id: job_id.clone(),
                query: "q".to_string(),
                file_path: path.clone(),
            })
            .unwrap();
        (job_id, path)
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_configured_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let pipeline = Arc::new(GatedPipeline {
            gate: Notify::new(),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let worker = AnalysisWorker::start(
            pipeline.clone(),
            store.clone(),
            WorkerOptions { max_concurrency: 2 },
            CancellationToken::new(),
        );

        let mut jobs = Vec::new();
        for n in 0..5 {
            jobs.push(enqueue(&dir, &store, &worker, n).await);
        }

        for _ in 0..500 {
            pipeline.gate.notify_waiters();
            let mut all_done = true;
            for (job_id, _) in &jobs {
                let job = store.get_job(job_id).await.unwrap().unwrap();
                all_done &= job.status == JobStatus::Completed;
            }
            if all_done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        for (job_id, path) in &jobs {
            wait_for_status(&store, job_id, JobStatus::Completed).await;
            assert!(!path.exists());
        }
        assert!(pipeline.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_analysis_still_completes_job_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let worker = AnalysisWorker::start(
            Arc::new(PanickingPipeline),
            store.clone(),
            WorkerOptions { max_concurrency: 1 },
            CancellationToken::new(),
        );

        let (job_id, path) = enqueue(&dir, &store, &worker, 0).await;
        wait_for_status(&store, &job_id, JobStatus::Completed).await;

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert!(job.result.unwrap().starts_with("Error: analysis task panicked"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn submit_fails_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let shutdown = CancellationToken::new();
        let worker = AnalysisWorker::start(
            Arc::new(PanickingPipeline),
            store,
            WorkerOptions { max_concurrency: 1 },
            shutdown.clone(),
        );

        shutdown.cancel();
        let mut rejected = false;
        for _ in 0..100 {
            let task = AnalysisTask {
                job_id: "late".to_string(),
                query: "q".to_string(),
                file_path: dir.path().join("never.txt"),
            };
            if worker.submit(task).is_err() {
                rejected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(rejected);
    }

    #[tokio::test]
    async fn shutdown_closes_queued_jobs_and_lets_running_ones_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let pipeline = Arc::new(GatedPipeline {
            gate: Notify::new(),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let shutdown = CancellationToken::new();
        let worker = AnalysisWorker::start(
            pipeline.clone(),
            store.clone(),
            WorkerOptions { max_concurrency: 1 },
            shutdown.clone(),
        );

        let (running_id, _) = enqueue(&dir, &store, &worker, 0).await;
        for _ in 0..200 {
            if pipeline.running.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pipeline.running.load(Ordering::SeqCst), 1);

        let mut queued = Vec::new();
        for n in 1..4 {
            queued.push(enqueue(&dir, &store, &worker, n).await);
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker.stopped())
            .await
            .unwrap();

        for (job_id, path) in &queued {
            let job = store.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(
                job.result.as_deref(),
                Some(format!("Error: {SHUTDOWN_MESSAGE}").as_str())
            );
            assert!(!path.exists());
        }

        let job = store.get_job(&running_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        for _ in 0..200 {
            pipeline.gate.notify_waiters();
            let job = store.get_job(&running_id).await.unwrap().unwrap();
            if job.status == JobStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let job = store.get_job(&running_id).await.unwrap().unwrap();
        assert_eq!(job.result.as_deref(), Some("done"));
    }
}
