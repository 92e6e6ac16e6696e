use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::info;

use super::prompts::{
    build_comprehension_prompt, build_recommendation_prompt, build_system_prompt, compose_report,
};
use super::types::{AnalysisConfig, AnalysisError, StageDefinition};
use crate::services::document_reader::read_document_text;
use crate::services::llm_client::{CompletionClient, CompletionRequest};

pub type AnalysisBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `analyze(query, file_path) -> report`: the only thing the job runner knows
/// about document analysis.
pub trait AnalysisPipeline: Send + Sync {
    fn analyze<'a>(
        &'a self,
        query: &'a str,
        file_path: &'a Path,
    ) -> AnalysisBoxFuture<'a, Result<String, AnalysisError>>;
}

/// Document comprehension followed by investment recommendation.
pub struct TwoStagePipeline<C> {
    client: C,
    config: AnalysisConfig,
}

impl<C: CompletionClient> TwoStagePipeline<C> {
    pub fn new(client: C, config: AnalysisConfig) -> Self {
        Self { client, config }
    }

    async fn run(&self, query: &str, file_path: &Path) -> Result<String, AnalysisError> {
        let path_text = file_path.display().to_string();
        let document = read_document_text(file_path, self.config.max_document_chars).await?;

        let analysis = self
            .run_stage(
                &self.config.comprehension,
                build_comprehension_prompt(&self.config.comprehension, query, &path_text, &document),
            )
            .await?;

        let recommendation = self
            .run_stage(
                &self.config.recommendation,
                build_recommendation_prompt(&self.config.recommendation, query, &path_text, &analysis),
            )
            .await?;

        Ok(compose_report(
            &self.config.comprehension,
            &analysis,
            &self.config.recommendation,
            &recommendation,
        ))
    }

    async fn run_stage(
        &self,
        stage: &StageDefinition,
        user_prompt: String,
    ) -> Result<String, AnalysisError> {
        info!("[PIPELINE] stage start: {}", stage.name);
        let text = self
            .client
            .complete(CompletionRequest {
                system_prompt: build_system_prompt(stage),
                user_prompt,
                purpose: stage.name.clone(),
            })
            .await
            .map_err(AnalysisError::Llm)?;
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse {
                stage: stage.name.clone(),
            });
        }
        info!("[PIPELINE] stage done: {}", stage.name);
        Ok(text)
    }
}

impl<C: CompletionClient> AnalysisPipeline for TwoStagePipeline<C> {
    fn analyze<'a>(
        &'a self,
        query: &'a str,
        file_path: &'a Path,
    ) -> AnalysisBoxFuture<'a, Result<String, AnalysisError>> {
        Box::pin(self.run(query, file_path))
    }
}
