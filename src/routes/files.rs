use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::file::{self, Visibility};
use crate::error::AppError;
use crate::services::files::{FileService, UploadRequest, UploadedFile};

/// Largest accepted file payload.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

const DEFAULT_APP: &str = "default";

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub app: String,
    pub tenant_id: Option<String>,
    pub owner_id: Option<String>,
    pub visibility: Visibility,
    pub bucket: String,
    pub object_key: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: chrono::NaiveDateTime,
}

impl From<file::Model> for FileResponse {
    fn from(model: file::Model) -> Self {
        Self {
            id: model.id,
            app: model.app,
            tenant_id: model.tenant_id,
            owner_id: model.owner_id,
            visibility: model.visibility,
            bucket: model.bucket,
            object_key: model.object_key,
            original_name: model.original_name,
            mime_type: model.mime_type,
            size: model.size,
            created_at: model.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct UploadQuery {
    /// Application namespace, `default` when omitted.
    pub app: Option<String>,
    #[serde(default)]
    #[param(inline)]
    pub visibility: Visibility,
    pub tenant_id: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListFilesQuery {
    /// Application namespace, `default` when omitted.
    pub app: Option<String>,
    /// Without it only files that have no tenant are listed.
    pub tenant_id: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UrlResponse {
    pub url: String,
}

/// Documented shape of the batch body. The handler reads the raw JSON so a
/// malformed body is a 400 and stray non-string entries are skipped.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct BatchUrlsRequest {
    pub ids: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BatchUrlsResponse {
    /// Keyed by each id as it was sent (after trimming).
    pub urls: HashMap<String, String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    pub ok: bool,
}

fn too_large() -> AppError {
    AppError::PayloadTooLarge("File exceeds the 200 MiB limit".to_string())
}

/// The body limit can trip while reading any part of the stream, not just
/// the file bytes.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large();
    }
    tracing::warn!("Invalid multipart data: {}", e);
    AppError::BadRequest(format!("Invalid multipart data: {}", e.body_text()))
}

fn app_or_default(app: Option<String>) -> String {
    app.filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_APP.to_string())
}

// POST /files/upload
#[utoipa::path(
    post,
    path = "/files/upload",
    params(UploadQuery),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded", body = FileResponse),
        (status = 400, description = "No file or invalid parameters"),
        (status = 413, description = "File larger than 200 MiB"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn upload_file(
    State(service): State<FileService>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<FileResponse>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(too_large());
        }

        upload = Some(UploadedFile {
            original_name,
            content_type,
            data: data.to_vec(),
        });
        break;
    }

    let record = service
        .upload(UploadRequest {
            file: upload,
            app: app_or_default(query.app),
            visibility: query.visibility,
            tenant_id: query.tenant_id,
            owner_id: query.owner_id,
        })
        .await?;

    Ok(Json(FileResponse::from(record)))
}

// GET /files/url/:id
#[utoipa::path(
    get,
    path = "/files/url/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Download URL", body = UrlResponse),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn download_url(
    State(service): State<FileService>,
    Path(id): Path<String>,
) -> Result<Json<UrlResponse>, AppError> {
    let url = service.download_url(&id).await?;
    Ok(Json(UrlResponse { url }))
}

// POST /files/url/batch
#[utoipa::path(
    post,
    path = "/files/url/batch",
    request_body = BatchUrlsRequest,
    responses(
        (status = 200, description = "Download URLs keyed by file ID; unknown IDs are omitted", body = BatchUrlsResponse),
        (status = 400, description = "ids missing, not an array or empty"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn batch_download_urls(
    State(service): State<FileService>,
    Json(body): Json<Value>,
) -> Result<Json<BatchUrlsResponse>, AppError> {
    let ids = match body.get("ids") {
        Some(Value::Array(ids)) => ids,
        _ => return Err(AppError::BadRequest("ids must be an array".to_string())),
    };
    if ids.is_empty() {
        return Err(AppError::BadRequest("ids should not be empty".to_string()));
    }

    let urls = service.download_urls_batch(ids).await?;
    Ok(Json(BatchUrlsResponse { urls }))
}

// GET /files
#[utoipa::path(
    get,
    path = "/files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Up to 200 files, newest first", body = [FileResponse]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn list_files(
    State(service): State<FileService>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let app = app_or_default(query.app);
    let records = service.list(&app, query.tenant_id.as_deref()).await?;

    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}

// DELETE /files/:id
#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn delete_file(
    State(service): State<FileService>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    service.remove(&id).await?;
    Ok(Json(DeleteResponse { ok: true }))
}
