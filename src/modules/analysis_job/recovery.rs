use std::path::Path;

use tracing::{info, warn};

use crate::models::analysis_job::{error_result, JobStore};
use crate::utils::uploads::is_transient_name;

pub const INTERRUPTED_MESSAGE: &str = "analysis interrupted by server restart";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub interrupted_jobs: usize,
    pub removed_files: usize,
}

/// Settles work a previous process left behind. Nothing is running yet, so
/// every pending job is an orphan and every upload this service wrote is
/// stale. Files with other names are left alone.
pub async fn recover_interrupted_jobs(
    store: &JobStore,
    upload_dir: &Path,
) -> Result<RecoveryReport, String> {
    let mut report = RecoveryReport::default();

    for job in store.list_pending().await? {
        if store
            .complete_job(&job.job_id, &error_result(INTERRUPTED_MESSAGE))
            .await?
        {
            report.interrupted_jobs += 1;
        }
    }

    report.removed_files = clear_upload_dir(upload_dir).await;

    if report.interrupted_jobs > 0 || report.removed_files > 0 {
        info!(
            "[ANALYSIS-JOB] startup recovery: interrupted_jobs={} removed_files={}",
            report.interrupted_jobs, report.removed_files
        );
    }
    Ok(report)
}

async fn clear_upload_dir(upload_dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(upload_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(
                "[UPLOAD] read upload dir failed: path={} error={}",
                upload_dir.display(),
                err
            );
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!("[UPLOAD] scan upload dir failed: {}", err);
                break;
            }
        };
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if !is_file || !is_transient_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(err) => warn!(
                "[UPLOAD] remove stale upload failed: path={} error={}",
                entry.path().display(),
                err
            ),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::{recover_interrupted_jobs, INTERRUPTED_MESSAGE};
    use crate::models::analysis_job::JobStatus;
    use crate::modules::analysis_job::executor::tests::open_store;
    use crate::utils::uploads::transient_path;

    #[tokio::test]
    async fn pending_jobs_become_error_results_and_uploads_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let upload_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).unwrap();
        std::fs::write(transient_path(&upload_dir, "report.pdf"), b"stale").unwrap();

        let orphan = store.create_job("report.pdf").await.unwrap();
        let finished = store.create_job("old.pdf").await.unwrap();
        store.complete_job(&finished, "Hold").await.unwrap();

        let report = recover_interrupted_jobs(&store, &upload_dir).await.unwrap();
        assert_eq!(report.interrupted_jobs, 1);
        assert_eq!(report.removed_files, 1);
        assert_eq!(std::fs::read_dir(&upload_dir).unwrap().count(), 0);

        let job = store.get_job(&orphan).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.result.as_deref(),
            Some(format!("Error: {INTERRUPTED_MESSAGE}").as_str())
        );
        let job = store.get_job(&finished).await.unwrap().unwrap();
        assert_eq!(job.result.as_deref(), Some("Hold"));
    }

    #[tokio::test]
    async fn files_not_written_by_the_service_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let upload_dir = dir.path().join("shared");
        std::fs::create_dir_all(&upload_dir).unwrap();
        let notes = upload_dir.join("notes.txt");
        std::fs::write(&notes, b"keep me").unwrap();
        let stale = transient_path(&upload_dir, "notes.txt");
        std::fs::write(&stale, b"stale").unwrap();

        let report = recover_interrupted_jobs(&store, &upload_dir).await.unwrap();

        assert_eq!(report.removed_files, 1);
        assert!(notes.exists());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn missing_upload_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let report = recover_interrupted_jobs(&store, &dir.path().join("absent"))
            .await
            .unwrap();
        assert_eq!(report.interrupted_jobs, 0);
        assert_eq!(report.removed_files, 0);
    }
}
