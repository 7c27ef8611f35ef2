use crate::AppState;
use crate::api::error::AppError;
use crate::services::upload_coordinator::{
    ChunkUploadForm, ChunkUploadResponse, CompleteUploadRequest, CompleteUploadResponse,
    DeleteFileResponse, FileListResponse, InitUploadRequest, InitUploadResponse,
    UploadStatusResponse,
};
use crate::utils::validation;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, header},
    response::Response,
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/api/v1/upload/init",
    request_body = InitUploadRequest,
    responses(
        (status = 200, description = "Upload initialized or deduplicated", body = InitUploadResponse),
        (status = 400, description = "Invalid request"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Content type not allowed")
    ),
    tag = "upload"
)]
pub async fn init_upload(
    State(state): State<AppState>,
    Json(req): Json<InitUploadRequest>,
) -> Result<Json<InitUploadResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validation::validate_file_size(req.file_size, state.config.max_file_size)?;
    validation::validate_mime_type(&req.content_type, &state.config.allowed_types)?;

    let res = state.coordinator.init_upload(req).await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/api/v1/upload/chunk",
    request_body(content = ChunkUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk stored", body = ChunkUploadResponse),
        (status = 400, description = "Missing or malformed field"),
        (status = 404, description = "Unknown file")
    ),
    tag = "upload"
)]
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ChunkUploadResponse>, AppError> {
    let mut file_id: Option<String> = None;
    let mut chunk_num: Option<i32> = None;
    let mut chunk: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_id = Some(text.trim().to_string());
            }
            "chunk_num" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let num = text.trim().parse::<i32>().map_err(|_| {
                    AppError::BadRequest(format!("chunk_num must be an integer, got {}", text))
                })?;
                chunk_num = Some(num);
            }
            "chunk" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read chunk: {}", e)))?;
                chunk = Some(data);
            }
            _ => {}
        }
    }

    let file_id = file_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("file_id is required".to_string()))?;
    let chunk_num =
        chunk_num.ok_or_else(|| AppError::BadRequest("chunk_num is required".to_string()))?;
    let chunk = chunk.ok_or_else(|| AppError::BadRequest("chunk is required".to_string()))?;

    let saved = state
        .coordinator
        .save_chunk(&file_id, chunk_num, Box::new(&chunk[..]))
        .await?;

    Ok(Json(ChunkUploadResponse {
        file_id: saved.file_id,
        chunk_num: saved.chunk_num,
        chunk_size: saved.chunk_size,
        status: "success".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/upload/complete",
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Chunks merged", body = CompleteUploadResponse),
        (status = 404, description = "Unknown file"),
        (status = 409, description = "Chunks missing or content already stored")
    ),
    tag = "upload"
)]
pub async fn complete_upload(
    State(state): State<AppState>,
    Json(req): Json<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let res = state.coordinator.complete_upload(&req.file_id).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/v1/upload/status/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Upload progress", body = UploadStatusResponse),
        (status = 404, description = "Unknown file")
    ),
    tag = "upload"
)]
pub async fn get_upload_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadStatusResponse>, AppError> {
    let res = state.coordinator.get_upload_status(&id).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/v1/upload/file/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown or unfinished file")
    ),
    tag = "upload"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let file = state.coordinator.get_file_info(&id).await?;
    let reader = state.coordinator.open_file(&file).await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let content_disposition =
        HeaderValue::from_str(&validation::content_disposition(&file.file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    tracing::info!("📤 Serving file {} ({} bytes)", file.id, file.file_size);

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, file.file_size)
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/upload/file/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteFileResponse),
        (status = 404, description = "Unknown file")
    ),
    tag = "upload"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteFileResponse>, AppError> {
    state.coordinator.delete_file(&id).await?;
    Ok(Json(DeleteFileResponse {
        file_id: id,
        status: "deleted".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/upload/files",
    responses(
        (status = 200, description = "Completed files", body = FileListResponse)
    ),
    tag = "upload"
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, AppError> {
    let files = state.coordinator.list_files().await?;
    Ok(Json(FileListResponse { files }))
}
