mod executor;
mod recovery;
pub mod types;
mod worker;

pub use recovery::recover_interrupted_jobs;
pub use types::{AnalysisTask, WorkerOptions};
pub use worker::AnalysisWorker;
