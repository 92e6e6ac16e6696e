use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read document {path}: {source}")]
    ReadDocument {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("could not extract text from {kind} document: {message}")]
    Extraction { kind: &'static str, message: String },
    #[error("document contains no extractable text")]
    EmptyDocument,
    #[error("LLM request failed: {0}")]
    Llm(String),
    #[error("stage '{stage}' returned no text")]
    EmptyResponse { stage: String },
}

/// One agent/task pair of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub description: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<i64>,
    pub timeout_seconds: u64,
}

/// Everything the pipeline needs, built once at startup and passed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub endpoint: ModelEndpoint,
    pub comprehension: StageDefinition,
    pub recommendation: StageDefinition,
    pub max_document_chars: usize,
}

impl AnalysisConfig {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            endpoint: ModelEndpoint {
                base_url: cfg.llm_base_url.clone(),
                api_key: cfg.llm_api_key.clone(),
                model: cfg.llm_model.clone(),
                temperature: cfg.llm_temperature,
                max_tokens: cfg.llm_max_tokens,
                timeout_seconds: cfg.llm_timeout_seconds,
            },
            comprehension: super::prompts::financial_analyst_stage(),
            recommendation: super::prompts::investment_advisor_stage(),
            max_document_chars: cfg.max_document_chars,
        }
    }
}
