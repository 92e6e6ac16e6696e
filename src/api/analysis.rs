use std::path::Path;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path as PathParam, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::DEFAULT_QUERY;
use crate::models::analysis_job::error_result;
use crate::modules::analysis_job::AnalysisTask;
use crate::state::AppState;
use crate::utils::uploads::{transient_path, write_transient_file};

const FALLBACK_FILENAME: &str = "document";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/results/{job_id}", get(get_result))
}

struct UploadForm {
    filename: String,
    data: Bytes,
    query: String,
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<Value>) {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": rejection.body_text()})),
            )
        }
    };
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let path = transient_path(&state.upload_dir, &form.filename);
    if let Err(err) = write_transient_file(&path, &form.data).await {
        error!("[UPLOAD] store upload failed: file={} error={}", form.filename, err);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Failed to store uploaded file"})),
        );
    }

    let job_id = match state.store.create_job(&form.filename).await {
        Ok(job_id) => job_id,
        Err(err) => {
            error!("[UPLOAD] create job failed: file={} error={}", form.filename, err);
            discard_upload(&path).await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "Failed to create analysis job"})),
            );
        }
    };

    let task = AnalysisTask {
        job_id: job_id.clone(),
        query: form.query,
        file_path: path.clone(),
    };
    if let Err(err) = state.worker.submit(task) {
        warn!("[UPLOAD] schedule analysis failed: job_id={} error={}", job_id, err);
        if let Err(err) = state
            .store
            .complete_job(&job_id, &error_result("analysis queue unavailable"))
            .await
        {
            warn!("[UPLOAD] close unscheduled job failed: job_id={} error={}", job_id, err);
        }
        discard_upload(&path).await;
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"detail": "Analysis queue is unavailable", "job_id": job_id})),
        );
    }

    info!(
        "[UPLOAD] analysis scheduled: job_id={} file={} bytes={}",
        job_id,
        form.filename,
        form.data.len()
    );
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Analysis has been started.",
            "job_id": job_id
        })),
    )
}

async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<UploadForm, (StatusCode, Json<Value>)> {
    let mut file: Option<(String, Bytes)> = None;
    let mut query: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err((err.status(), Json(json!({"detail": err.body_text()})))),
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| (err.status(), Json(json!({"detail": err.body_text()}))))?;
                file = Some((filename, data));
            }
            Some("query") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| (err.status(), Json(json!({"detail": err.body_text()}))))?;
                query = Some(text);
            }
            _ => {}
        }
    }

    let Some((filename, data)) = file else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Missing required form field: file"})),
        ));
    };
    let query = query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    Ok(UploadForm {
        filename,
        data,
        query,
    })
}

async fn discard_upload(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(
            "[UPLOAD] remove unscheduled upload failed: path={} error={}",
            path.display(),
            err
        );
    }
}

async fn get_result(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<String>,
) -> (StatusCode, Json<Value>) {
    match state.store.get_job(&job_id).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(json!({
                "job_id": job.job_id,
                "status": job.status,
                "result": job.result
            })),
        ),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"}))),
        Err(err) => {
            error!("[ANALYSIS-JOB] load job failed: job_id={} error={}", job_id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "Failed to load job"})),
            )
        }
    }
}
