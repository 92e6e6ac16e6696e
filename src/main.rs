mod api;
mod config;
mod core;
mod db;
mod logger;
mod models;
mod modules;
mod repositories;
mod services;
mod state;
mod utils;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::models::analysis_job::JobStore;
use crate::modules::analysis_job::{recover_interrupted_jobs, AnalysisWorker, WorkerOptions};
use crate::services::analysis::{AnalysisConfig, TwoStagePipeline};
use crate::services::llm_client::OpenAiCompatClient;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cfg = match config::Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Failed to load config: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = logger::init_logger(&cfg) {
        eprintln!("Failed to init logger: {err}");
        std::process::exit(1);
    }

    let pool = match db::init_sqlite(&db::SqliteConfig::at(cfg.database_path.clone())).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("Failed to init database: {err}");
            std::process::exit(1);
        }
    };
    let store = JobStore::new(pool);

    if let Err(err) = recover_interrupted_jobs(&store, &cfg.upload_dir).await {
        error!("Failed to recover interrupted jobs: {err}");
        std::process::exit(1);
    }

    let analysis_config = AnalysisConfig::from_config(&cfg);
    let client = match OpenAiCompatClient::new(analysis_config.endpoint.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build LLM client: {err}");
            std::process::exit(1);
        }
    };
    let pipeline = Arc::new(TwoStagePipeline::new(client, analysis_config));

    cfg.print();

    let shutdown = CancellationToken::new();
    let worker = AnalysisWorker::start(
        pipeline,
        store.clone(),
        WorkerOptions::from_config(&cfg),
        shutdown.clone(),
    );

    let state = AppState {
        store,
        worker: worker.clone(),
        upload_dir: cfg.upload_dir.clone(),
    };
    let app = api::router(state, &cfg);

    let host = cfg
        .host
        .parse::<IpAddr>()
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let addr = SocketAddr::new(host, cfg.port);
    info!("Server running on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!("Failed to bind: {err}");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app);

    if let Err(err) = server
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
    {
        error!("Server error: {err}");
    }

    shutdown.cancel();
    worker.stopped().await;
    info!("Analysis worker stopped");
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
    shutdown.cancel();
}
