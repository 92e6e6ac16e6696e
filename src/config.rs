use std::path::PathBuf;

pub const DEFAULT_QUERY: &str =
    "Provide a detailed financial analysis and investment recommendation.";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_max_files: String,
    pub cors_origins: Vec<String>,
    pub database_path: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_concurrent_analyses: usize,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f64,
    pub llm_max_tokens: Option<i64>,
    pub llm_timeout_seconds: u64,
    pub max_document_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Config, String> {
        let read_usize = |key: &str, def: usize| -> usize {
            match std::env::var(key) {
                Ok(v) => v.trim().parse::<usize>().unwrap_or(def),
                Err(_) => def,
            }
        };
        let read_num = |key: &str, def: f64| -> f64 {
            match std::env::var(key) {
                Ok(v) => v.trim().parse::<f64>().unwrap_or(def),
                Err(_) => def,
            }
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| format!("invalid PORT {v:?}: {e}"))?,
            Err(_) => 8000,
        };

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_max_files = std::env::var("LOG_MAX_FILES").unwrap_or_else(|_| "7d".to_string());

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => vec!["*".to_string()],
        };

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "data/analysis_results.db".to_string());
        let upload_dir = PathBuf::from(
            std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "data/uploads".to_string()),
        );
        let max_upload_bytes = read_usize("MAX_UPLOAD_BYTES", 50 * 1024 * 1024).max(1024);
        let max_concurrent_analyses = read_usize("ANALYSIS_MAX_CONCURRENCY", 4).max(1);

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
        let llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
        let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama3".to_string());
        let llm_temperature = read_num("LLM_TEMPERATURE", 0.2);
        let llm_max_tokens = std::env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0);
        let llm_timeout_seconds = read_usize("LLM_TIMEOUT_SECONDS", 300).max(1) as u64;
        let max_document_chars = read_usize("ANALYSIS_MAX_DOCUMENT_CHARS", 20_000).max(1000);

        Ok(Config {
            host,
            port,
            log_level,
            log_max_files,
            cors_origins,
            database_path,
            upload_dir,
            max_upload_bytes,
            max_concurrent_analyses,
            llm_base_url,
            llm_api_key,
            llm_model,
            llm_temperature,
            llm_max_tokens,
            llm_timeout_seconds,
            max_document_chars,
        })
    }

    pub fn print(&self) {
        println!("Current configuration:");
        println!("  - HOST: {}", self.host);
        println!("  - PORT: {}", self.port);
        println!("  - LOG_LEVEL: {}", self.log_level);
        println!("  - DATABASE_PATH: {}", self.database_path);
        println!("  - UPLOAD_DIR: {}", self.upload_dir.display());
        println!("  - MAX_UPLOAD_BYTES: {}", self.max_upload_bytes);
        println!("  - Analysis:");
        println!("    • ANALYSIS_MAX_CONCURRENCY: {}", self.max_concurrent_analyses);
        println!("    • ANALYSIS_MAX_DOCUMENT_CHARS: {}", self.max_document_chars);
        println!("    • LLM_BASE_URL: {}", self.llm_base_url);
        println!("    • LLM_MODEL: {}", self.llm_model);
        println!(
            "    • LLM_API_KEY: {}",
            if self.llm_api_key.is_empty() { "not set" } else { "set" }
        );
        println!("    • LLM_TEMPERATURE: {}", self.llm_temperature);
        println!("    • LLM_TIMEOUT_SECONDS: {}", self.llm_timeout_seconds);
    }
}
