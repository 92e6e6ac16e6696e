use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use once_cell::sync::OnceCell;
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::Config;

const LOG_DIR: &str = "logs";

struct LoggerGuards {
    _file: tracing_appender::non_blocking::WorkerGuard,
    _error: tracing_appender::non_blocking::WorkerGuard,
}

static LOG_GUARDS: OnceCell<LoggerGuards> = OnceCell::new();

pub fn init_logger(cfg: &Config) -> Result<(), String> {
    let log_dir = Path::new(LOG_DIR);
    fs::create_dir_all(log_dir).map_err(|e| format!("create log dir failed: {e}"))?;

    let removed = cleanup_old_logs(log_dir, &cfg.log_max_files);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone()));

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "analyzer.log"));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "error.log"));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_writer(std::io::stdout);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .json()
        .with_writer(file_writer);

    let error_layer = fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339())
        .json()
        .with_writer(error_writer)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(error_layer)
        .try_init()
        .map_err(|e| format!("install subscriber failed: {e}"))?;

    let _ = LOG_GUARDS.set(LoggerGuards {
        _file: file_guard,
        _error: error_guard,
    });

    std::panic::set_hook(Box::new(|panic_info| {
        let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "panic occurred".to_string()
        };
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(panic = %payload, location = %location, "panic");
    }));

    if removed > 0 {
        tracing::info!("[LOGGER] removed {} expired log files", removed);
    }
    Ok(())
}

fn cleanup_old_logs(log_dir: &Path, max_files: &str) -> usize {
    let keep_days = parse_keep_days(max_files);
    if keep_days == 0 {
        return 0;
    }
    let Some(cutoff) = SystemTime::now().checked_sub(Duration::from_secs(keep_days * 24 * 3600))
    else {
        return 0;
    };
    let Ok(entries) = fs::read_dir(log_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if expired && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

fn parse_keep_days(value: &str) -> u64 {
    let raw = value.trim().to_lowercase();
    raw.strip_suffix('d')
        .unwrap_or(&raw)
        .parse::<u64>()
        .unwrap_or(0)
}
