use axum::{
    extract::{Path, State},
    Extension, Json,
};
use crush_core::Applicant;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_report_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct PdfData {
    applicant: Applicant,
    artifact_url: String,
}

pub(super) async fn generate_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Applicant>>, ApiError> {
    let applicant = state
        .generator
        .generate(id)
        .await
        .map_err(|e| map_report_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: applicant,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn generate_pdf(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PdfData>>, ApiError> {
    let outcome = state
        .pdf
        .build(id)
        .await
        .map_err(|e| map_report_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PdfData {
            applicant: outcome.applicant,
            artifact_url: outcome.artifact_url,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
