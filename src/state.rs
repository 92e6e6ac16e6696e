use std::path::PathBuf;

use crate::models::analysis_job::JobStore;
use crate::modules::analysis_job::AnalysisWorker;

/// Everything a request handler needs; cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub worker: AnalysisWorker,
    pub upload_dir: PathBuf,
}
