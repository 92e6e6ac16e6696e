use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Row, SqlitePool,
};
use tracing::info;

use super::types::SqliteConfig;

pub async fn init_sqlite(cfg: &SqliteConfig) -> Result<SqlitePool, String> {
    let path = Path::new(&cfg.db_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("create sqlite dir failed: {e}"))?;
        }
    }

    // FULL sync so a returned write survives a crash.
    let mut options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    if let Some(timeout) = cfg.busy_timeout_ms {
        options = options.busy_timeout(Duration::from_millis(timeout));
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(|e| format!("sqlite connect failed: {e}"))?;

    create_tables_sqlite(&pool).await?;

    info!("[SQLite] database initialized: {}", cfg.db_path);
    Ok(pool)
}

async fn create_tables_sqlite(pool: &SqlitePool) -> Result<(), String> {
    let statements = vec![r#"CREATE TABLE IF NOT EXISTS analysis_jobs (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            filename TEXT,
            result TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"#];

    for sql in statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| format!("create table failed: {e}"))?;
    }

    // Databases written by the first release only carry the four core columns.
    ensure_column(pool, "analysis_jobs", "created_at", "TEXT").await?;
    ensure_column(pool, "analysis_jobs", "updated_at", "TEXT").await?;

    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_analysis_jobs_status ON analysis_jobs(status)",
        "CREATE INDEX IF NOT EXISTS idx_analysis_jobs_created_at ON analysis_jobs(created_at)",
    ];
    for sql in indexes {
        let _ = sqlx::query(sql).execute(pool).await;
    }

    Ok(())
}

async fn ensure_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    ddl: &str,
) -> Result<(), String> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await
        .map_err(|e| format!("read {table} columns failed: {e}"))?;
    let columns: HashSet<String> = rows
        .iter()
        .filter_map(|row| row.try_get::<String, _>("name").ok())
        .collect();
    if !columns.contains(column) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ddl);
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| format!("add {column} column failed: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::init_sqlite;
    use crate::db::SqliteConfig;

    #[tokio::test]
    async fn creates_database_file_and_jobs_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("jobs.db");
        let pool = init_sqlite(&SqliteConfig::at(path.to_string_lossy()))
            .await
            .expect("init sqlite");

        assert!(path.exists());
        let rows = sqlx::query("PRAGMA table_info(analysis_jobs)")
            .fetch_all(&pool)
            .await
            .expect("table info");
        let names: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
        for column in ["job_id", "status", "filename", "result", "created_at"] {
            assert!(names.iter().any(|n| n == column), "missing column {column}");
        }
    }

    #[tokio::test]
    async fn reopening_existing_database_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = SqliteConfig::at(dir.path().join("jobs.db").to_string_lossy());
        let first = init_sqlite(&cfg).await.expect("first open");
        first.close().await;
        init_sqlite(&cfg).await.expect("second open");
    }
}
