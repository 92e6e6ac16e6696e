use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub job_id: String,
    pub query: String,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    /// The job had already left `pending`; nothing was written.
    Discarded,
    PersistFailed,
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub max_concurrency: usize,
}

impl WorkerOptions {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            max_concurrency: cfg.max_concurrent_analyses.max(1),
        }
    }
}
