mod batch;
mod reports;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crush_ai::AiCompleter;
use crush_core::AppConfig;
use crush_report::{
    BatchOrchestrator, BrandingAssets, ChromeRenderer, FsArtifactStore, ImageNormalizer,
    PdfBuilder, PgStore, ReportError, ReportGenerator,
};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub generator: Arc<ReportGenerator>,
    pub pdf: Arc<PdfBuilder>,
    pub orchestrator: BatchOrchestrator,
}

impl AppState {
    /// Wires the pipeline against Postgres, the configured AI backend, the
    /// headless browser and the local artifact directory.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built or the AI backend settings are
    /// incomplete.
    pub fn from_config(pool: PgPool, config: &AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(PgStore::new(pool.clone()));
        let images = ImageNormalizer::from_app_config(config)?;
        let ai = AiCompleter::from_app_config(config)?;
        tracing::info!(backend = ai.backend_name(), "AI backend configured");

        let generator = Arc::new(ReportGenerator::new(store.clone(), images, ai));
        let pdf = Arc::new(PdfBuilder::new(
            store.clone(),
            Arc::new(ChromeRenderer::from_app_config(config)),
            Arc::new(FsArtifactStore::from_app_config(config)),
            BrandingAssets::load(&config.assets_dir),
        ));
        let orchestrator = BatchOrchestrator::new(
            store.clone(),
            store,
            Arc::clone(&generator),
            Arc::clone(&pdf),
        );

        Ok(Self {
            pool,
            generator,
            pdf,
            orchestrator,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" | "already_running" => StatusCode::CONFLICT,
            "no_usable_images" | "no_report" | "malformed_report_json" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            "external_service_failed" => StatusCode::BAD_GATEWAY,
            "timeout" | "render_timeout" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &crush_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_report_error(request_id: String, error: &ReportError) -> ApiError {
    if let ReportError::Store(db) = error {
        return map_db_error(request_id, db);
    }
    tracing::warn!(code = error.kind(), error = %error, "report pipeline failed");
    ApiError::new(request_id, error.kind(), error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/applicants/{id}/report",
            post(reports::generate_report),
        )
        .route("/api/v1/applicants/{id}/pdf", post(reports::generate_pdf))
        .route("/api/v1/batch-report/process", post(batch::start_batch))
        .route("/api/v1/batch-report/progress", get(batch::get_progress))
        .route("/api/v1/batch-report/records", get(batch::list_records))
        .route("/api/v1/batch-report/status", get(batch::get_status))
        .route("/api/v1/batch-report/pending", get(batch::list_pending))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    match crush_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
