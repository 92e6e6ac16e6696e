use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub db_path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: Option<u64>,
}

impl SqliteConfig {
    pub fn at(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: "data/analysis_results.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: Some(30000),
        }
    }
}
