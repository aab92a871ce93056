mod files;
mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::files::FileService;

// Multipart framing around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        files::upload_file,
        files::download_url,
        files::batch_download_urls,
        files::list_files,
        files::delete_file,
    ),
    components(
        schemas(
            health::HealthResponse,
            files::FileResponse,
            files::UrlResponse,
            files::BatchUrlsRequest,
            files::BatchUrlsResponse,
            files::DeleteResponse,
            crate::entities::file::Visibility,
        )
    ),
    tags(
        (name = "General", description = "Service status"),
        (name = "Files", description = "Upload, link, list and delete stored files")
    ),
    info(
        title = "FileLinkKit API",
        version = "0.1.0",
        description = "Stores uploads in S3-compatible storage and hands out public or presigned download links",
    )
)]
struct ApiDoc;

pub fn create_routes(service: FileService) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let app_routes = Router::new()
        .route("/health", get(health::health))
        .route("/files", get(files::list_files))
        .route(
            "/files/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(
                files::MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route("/files/url/batch", post(files::batch_download_urls))
        .route("/files/url/{id}", get(files::download_url))
        .route("/files/{id}", delete(files::delete_file))
        .with_state(service);

    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
        .layer(TraceLayer::new_for_http())
}
