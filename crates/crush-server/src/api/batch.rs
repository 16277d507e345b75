use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use crush_core::ProcessingRecord;
use crush_report::BatchError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct StartBatchRequest {
    user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchAccepted {
    run_id: Uuid,
    total: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct ProgressData {
    run_id: Option<Uuid>,
    current: usize,
    total: usize,
    current_user: String,
    status: String,
    is_complete: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusData {
    is_processing: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct RecordsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct PendingItem {
    applicant_id: Uuid,
    name: String,
    matched_at: Option<DateTime<Utc>>,
    matched_with_id: Option<Uuid>,
    matched_with_name: Option<String>,
}

/// Accepts a batch and returns immediately; the run continues in the
/// background.
pub(super) async fn start_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StartBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BatchAccepted>>), ApiError> {
    let started = state
        .orchestrator
        .start_batch(body.user_ids)
        .map_err(|e| match e {
            BatchError::AlreadyRunning => {
                ApiError::new(req_id.0.clone(), "already_running", e.to_string())
            }
            BatchError::Empty => {
                ApiError::new(req_id.0.clone(), "validation_error", "user_ids must not be empty")
            }
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: BatchAccepted {
                run_id: started.run_id,
                total: started.total,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn get_progress(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ProgressData>> {
    let progress = state.orchestrator.progress();
    let is_complete = progress.is_complete();

    Json(ApiResponse {
        data: ProgressData {
            run_id: progress.run_id,
            current: progress.current,
            total: progress.total,
            current_user: progress.current_user,
            status: progress.status,
            is_complete,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn get_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<StatusData>> {
    Json(ApiResponse {
        data: StatusData {
            is_processing: state.orchestrator.is_running(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn list_records(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<ApiResponse<Vec<ProcessingRecord>>>, ApiError> {
    let records = state
        .orchestrator
        .records(query.limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: records,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_pending(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PendingItem>>>, ApiError> {
    let rows = crush_db::list_applicants_needing_report(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PendingItem {
            applicant_id: row.id,
            name: row.name,
            matched_at: row.matched_at,
            matched_with_id: row.matched_with_id,
            matched_with_name: row.matched_with_name,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
