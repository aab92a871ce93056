use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::file::{self, Visibility};
use crate::error::AppError;
use crate::services::s3::ObjectStore;

/// Upper bound on ids resolved by one batch request.
pub const MAX_BATCH_IDS: usize = 1000;
/// Upper bound on records returned by a listing.
pub const LIST_LIMIT: u64 = 200;

const MAX_BASE_NAME_CHARS: usize = 180;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MAX_APP_CHARS: usize = 50;
const MAX_PARTITION_CHARS: usize = 80;
const MAX_ORIGINAL_NAME_CHARS: usize = 255;
const MAX_MIME_TYPE_CHARS: usize = 120;

/// Where uploads go and how download links are built.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub bucket: String,
    /// Prefix of public download links, without a trailing slash.
    pub public_base_url: String,
    pub presign_expires: Duration,
}

/// File payload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub app: String,
    pub visibility: Visibility,
    pub tenant_id: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Clone)]
pub struct FileService {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    settings: StorageSettings,
}

impl FileService {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn ObjectStore>,
        settings: StorageSettings,
    ) -> Self {
        Self {
            db,
            store,
            settings,
        }
    }

    /// Stores the payload under a fresh key, then records its metadata.
    ///
    /// The object write and the insert are not atomic: if the insert fails
    /// the object stays in the bucket.
    pub async fn upload(&self, request: UploadRequest) -> Result<file::Model, AppError> {
        let upload = request
            .file
            .ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;

        check_len("app", &request.app, MAX_APP_CHARS)?;
        check_app(&request.app)?;
        if let Some(tenant_id) = &request.tenant_id {
            check_len("tenantId", tenant_id, MAX_PARTITION_CHARS)?;
        }
        if let Some(owner_id) = &request.owner_id {
            check_len("ownerId", owner_id, MAX_PARTITION_CHARS)?;
        }
        check_len("file name", &upload.original_name, MAX_ORIGINAL_NAME_CHARS)?;

        let content_type = upload
            .content_type
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        check_len("content type", &content_type, MAX_MIME_TYPE_CHARS)?;

        let object_key = object_key(
            request.visibility,
            &request.app,
            &storage_filename(&upload.original_name),
        );
        let bucket = self.settings.bucket.clone();
        let size = upload.data.len() as i64;

        self.store
            .put_object(&bucket, &object_key, upload.data, &content_type)
            .await?;
        debug!(bucket = %bucket, key = %object_key, size, "Object stored");

        let record = file::ActiveModel {
            id: Set(Uuid::new_v4()),
            app: Set(request.app),
            tenant_id: Set(request.tenant_id),
            owner_id: Set(request.owner_id),
            visibility: Set(request.visibility),
            bucket: Set(bucket),
            object_key: Set(object_key),
            original_name: Set(upload.original_name),
            mime_type: Set(content_type),
            size: Set(size),
            created_at: Set(chrono::Utc::now().naive_utc()),
        };

        let saved = record.insert(&self.db).await?;
        info!(
            id = %saved.id,
            app = %saved.app,
            key = %saved.object_key,
            size = saved.size,
            "File uploaded"
        );

        Ok(saved)
    }

    pub async fn download_url(&self, file_id: &str) -> Result<String, AppError> {
        let record = self.find_record(file_id).await?;
        self.resolve_url(&record).await
    }

    /// Resolves links for many files at once. Ids without a record are
    /// left out of the returned map.
    pub async fn download_urls_batch(
        &self,
        ids: &[Value],
    ) -> Result<HashMap<String, String>, AppError> {
        let ids = sanitize_ids(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        // Strings that are not UUIDs can never match a record.
        let requested: Vec<(String, Uuid)> = ids
            .into_iter()
            .filter_map(|id| Uuid::parse_str(&id).ok().map(|uuid| (id, uuid)))
            .collect();
        if requested.is_empty() {
            return Ok(HashMap::new());
        }

        let uuids: HashSet<Uuid> = requested.iter().map(|(_, uuid)| *uuid).collect();
        let records = file::Entity::find()
            .filter(file::Column::Id.is_in(uuids))
            .all(&self.db)
            .await?;
        debug!(
            requested = requested.len(),
            found = records.len(),
            "Resolving batch download urls"
        );

        let resolved: HashMap<Uuid, String> =
            try_join_all(records.iter().map(|record| async move {
                let url = self.resolve_url(record).await?;
                Ok::<_, AppError>((record.id, url))
            }))
            .await?
            .into_iter()
            .collect();

        // Keyed by the id exactly as sent, so `B484...` and `b484...` both find their entry.
        Ok(requested
            .into_iter()
            .filter_map(|(id, uuid)| resolved.get(&uuid).map(|url| (id, url.clone())))
            .collect())
    }

    /// Deletes the object, then its record. A failed object delete leaves
    /// the record in place.
    pub async fn remove(&self, file_id: &str) -> Result<(), AppError> {
        let record = self.find_record(file_id).await?;

        self.store
            .delete_object(&record.bucket, &record.object_key)
            .await?;
        file::Entity::delete_by_id(record.id).exec(&self.db).await?;

        info!(id = %record.id, key = %record.object_key, "File removed");
        Ok(())
    }

    /// Newest first, at most [`LIST_LIMIT`] records. No tenant means records
    /// without a tenant, not every tenant.
    pub async fn list(
        &self,
        app: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<file::Model>, AppError> {
        let query = file::Entity::find().filter(file::Column::App.eq(app));
        let query = match tenant_id {
            Some(tenant_id) => query.filter(file::Column::TenantId.eq(tenant_id)),
            None => query.filter(file::Column::TenantId.is_null()),
        };

        let records = query
            .order_by_desc(file::Column::CreatedAt)
            .limit(LIST_LIMIT)
            .all(&self.db)
            .await?;

        Ok(records)
    }

    async fn find_record(&self, file_id: &str) -> Result<file::Model, AppError> {
        let not_found = || AppError::NotFound("File not found".to_string());
        let id = Uuid::parse_str(file_id.trim()).map_err(|_| not_found())?;

        file::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found)
    }

    async fn resolve_url(&self, record: &file::Model) -> Result<String, AppError> {
        match record.visibility {
            Visibility::Public => Ok(format!(
                "{}/{}",
                self.settings.public_base_url, record.object_key
            )),
            Visibility::Private => {
                self.store
                    .presign_get_url(
                        &record.bucket,
                        &record.object_key,
                        self.settings.presign_expires,
                    )
                    .await
            }
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// `app` becomes one path segment of the object key, so it must be a plain
/// non-empty name.
fn check_app(app: &str) -> Result<(), AppError> {
    if app.is_empty() {
        return Err(AppError::BadRequest("app must not be empty".to_string()));
    }
    if app.contains(['/', '\\']) || app == "." || app == ".." {
        return Err(AppError::BadRequest(
            "app must not contain path separators or be a relative path segment".to_string(),
        ));
    }
    Ok(())
}

/// `{public|private}/{app}/{filename}`
pub fn object_key(visibility: Visibility, app: &str, filename: &str) -> String {
    format!("{}/{}/{}", visibility.key_prefix(), app, filename)
}

/// Builds a collision-free, URL-safe name: `{sanitized base}_{uuid}{ext}`.
pub fn storage_filename(original_name: &str) -> String {
    let name = original_name.rsplit('/').next().unwrap_or_default();
    let (base, ext) = split_extension(name);
    let base: String = sanitize_segment(base)
        .chars()
        .take(MAX_BASE_NAME_CHARS)
        .collect();

    format!("{}_{}{}", base, Uuid::new_v4(), sanitize_segment(ext))
}

/// Splits at the last dot. Dotfiles such as `.env` have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Replaces each run of characters outside `[a-zA-Z0-9._-]` with one `_`.
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Keeps trimmed, non-empty strings in first-seen order, without
/// duplicates, capped at [`MAX_BATCH_IDS`].
pub fn sanitize_ids(ids: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(*id))
        .take(MAX_BATCH_IDS)
        .map(str::to_string)
        .collect()
}
