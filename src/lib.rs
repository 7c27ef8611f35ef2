pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::upload_coordinator::UploadCoordinator;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::upload::init_upload,
        api::handlers::upload::upload_chunk,
        api::handlers::upload::complete_upload,
        api::handlers::upload::get_upload_status,
        api::handlers::upload::download_file,
        api::handlers::upload::delete_file,
        api::handlers::upload::list_files,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            entities::file_infos::FileStatus,
            services::upload_coordinator::InitUploadRequest,
            services::upload_coordinator::InitUploadResponse,
            services::upload_coordinator::InitStatus,
            services::upload_coordinator::ChunkUploadForm,
            services::upload_coordinator::ChunkUploadResponse,
            services::upload_coordinator::CompleteUploadRequest,
            services::upload_coordinator::CompleteUploadResponse,
            services::upload_coordinator::UploadStatusResponse,
            services::upload_coordinator::FileInfoResponse,
            services::upload_coordinator::FileListResponse,
            services::upload_coordinator::DeleteFileResponse,
        )
    ),
    tags(
        (name = "upload", description = "Resumable chunked upload endpoints"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

/// Shared request-handler state. The coordinator is built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<UploadCoordinator>,
    pub config: UploadConfig,
}

pub fn create_app(state: AppState) -> Router {
    let upload_routes = Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route("/upload/init", post(api::handlers::upload::init_upload))
        .route(
            "/upload/chunk",
            post(api::handlers::upload::upload_chunk)
                .layer(DefaultBodyLimit::max(state.config.chunk_body_limit())),
        )
        .route(
            "/upload/complete",
            post(api::handlers::upload::complete_upload),
        )
        .route(
            "/upload/status/:id",
            get(api::handlers::upload::get_upload_status),
        )
        .route(
            "/upload/file/:id",
            get(api::handlers::upload::download_file).delete(api::handlers::upload::delete_file),
        )
        .route("/upload/files", get(api::handlers::upload::list_files));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", upload_routes)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
