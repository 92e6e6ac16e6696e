pub mod pipeline;
pub mod prompts;
pub mod types;

pub use pipeline::{AnalysisPipeline, TwoStagePipeline};
pub use types::{AnalysisConfig, AnalysisError};
